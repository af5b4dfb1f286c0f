//! Courier: forwards a running process's logs to Telegram in batches.
//!
//! Log records are tapped from the host log stream (a `tracing` layer or a
//! piped stdin), filtered by origin and importance, queued, and flushed on a
//! timer as grouped silent messages to every configured admin chat.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod layer;
pub mod logging;
pub mod notifier;
pub mod pipe;
pub mod relay;
pub mod watcher;
