//! Outbound delivery of relay batches.
//!
//! [`Notifier`] is the seam between the relay and the chat transport.
//! [`TelegramNotifier`] uses teloxide's `Bot` directly (send-only, no
//! dispatcher), splitting bodies that exceed Telegram's message limit.

use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::debug;

use crate::relay::origin::NOTIFIER_TARGET;

/// Telegram's per-message text limit, in characters.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Errors produced by a [`Notifier`].
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The transport rejected or failed the request.
    #[error("delivery to {destination} failed: {reason}")]
    Delivery {
        /// Destination chat ID.
        destination: i64,
        /// Transport-reported reason.
        reason: String,
    },
}

/// Sends text to a chat destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` with a normal (audible) notification.
    async fn send(&self, destination: i64, text: &str) -> Result<(), NotifyError>;

    /// Deliver `text` without notification sound or banner.
    async fn send_silent(&self, destination: i64, text: &str) -> Result<(), NotifyError>;
}

/// [`Notifier`] backed by the Telegram Bot API.
pub struct TelegramNotifier {
    bot: Bot,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier").finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    /// Create a notifier for the given bot token.
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
        }
    }

    async fn deliver(&self, destination: i64, text: &str, silent: bool) -> Result<(), NotifyError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_CHARS) {
            self.bot
                .send_message(ChatId(destination), chunk)
                .disable_notification(silent)
                .await
                .map_err(|e| NotifyError::Delivery {
                    destination,
                    reason: e.to_string(),
                })?;
        }
        debug!(target: NOTIFIER_TARGET, destination, silent, "telegram message sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, destination: i64, text: &str) -> Result<(), NotifyError> {
        self.deliver(destination, text, false).await
    }

    async fn send_silent(&self, destination: i64, text: &str) -> Result<(), NotifyError> {
        self.deliver(destination, text, true).await
    }
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Breaks at the last newline inside the window when there is one; a single
/// line longer than the window is cut at a character boundary.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let window_end = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(idx, _)| idx);
        let window = &rest[..window_end];
        let (chunk, next) = match window.rfind('\n') {
            Some(nl) if nl > 0 => (&rest[..nl], &rest[nl.saturating_add(1)..]),
            _ => (window, &rest[window_end..]),
        };
        chunks.push(chunk.to_owned());
        rest = next;
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_owned());
    }
    chunks
}
