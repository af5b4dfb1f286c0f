//! Configuration loading and persistence.
//!
//! Courier reads a single `courier.toml`. The relay's runtime switches
//! (admin chats, mode, legacy enable flag) are accessed by dotted key through
//! [`ConfigStore`] so they can be rewritten at runtime; the static tuning
//! knobs under `[relay]` and `[telegram]` deserialize into typed structs.
//!
//! Path precedence: `--config` flag > `$COURIER_CONFIG` > `~/.courier/courier.toml`.

pub mod store;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub use store::{ConfigStore, ConfigValue, StoreError, TomlConfigStore};

use crate::relay::classifier::DEFAULT_IMPORTANT_KEYWORDS;

/// Dotted key of the legacy on/off switch for log forwarding.
pub const KEY_ENABLE_SERVER_LOGS: &str = "telegram.notifications.enable_server_logs";

/// Dotted key of the relay mode name.
pub const KEY_LOG_MODE: &str = "telegram.notifications.log_mode";

/// Dotted key of the destination chat ID list.
pub const KEY_ADMIN_IDS: &str = "telegram.admin_ids";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "COURIER_CONFIG";

/// Static relay tuning read once at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// Seconds between dispatcher ticks (also the initial delay).
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Maximum lines drained per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds `stop` waits for an in-flight tick before aborting it.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Queue bound; `0` means unbounded. Overflow drops the oldest line.
    #[serde(default)]
    pub max_pending: usize,

    /// Case-insensitive substrings that mark a line as important.
    #[serde(default = "default_important_keywords")]
    pub important_keywords: Vec<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            batch_size: default_batch_size(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            max_pending: 0,
            important_keywords: default_important_keywords(),
        }
    }
}

impl RelaySettings {
    /// Dispatcher period. Clamped to at least one second.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }

    /// Grace period granted to an in-flight tick on shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Queue bound, `None` when unbounded.
    pub fn queue_capacity(&self) -> Option<usize> {
        (self.max_pending > 0).then_some(self.max_pending)
    }
}

/// Telegram bot credentials lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    /// Environment variable name holding the bot token.
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token_env: default_bot_token_env(),
        }
    }
}

/// Typed view over the static sections of `courier.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// `[relay]` section.
    pub relay: RelaySettings,
    /// `[telegram]` section (only the fields Courier needs).
    pub telegram: TelegramSettings,
}

impl CourierConfig {
    /// Deserialize the static sections from the store's current document.
    ///
    /// # Errors
    ///
    /// Returns an error if a section exists but has mistyped fields.
    pub fn from_store(store: &TomlConfigStore) -> anyhow::Result<Self> {
        let table = store.snapshot();
        toml::Value::Table(table)
            .try_into::<Self>()
            .map_err(|e| anyhow::anyhow!("invalid courier config: {e}"))
    }
}

fn default_flush_interval_secs() -> u64 {
    2
}
fn default_batch_size() -> usize {
    5
}
fn default_shutdown_grace_secs() -> u64 {
    5
}
fn default_important_keywords() -> Vec<String> {
    DEFAULT_IMPORTANT_KEYWORDS
        .iter()
        .map(|k| (*k).to_owned())
        .collect()
}
fn default_bot_token_env() -> String {
    "COURIER_TELEGRAM_TOKEN".to_owned()
}

/// Resolve the default config directory (`~/.courier/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".courier"))
}

/// Resolve the config file path from an explicit flag, the environment, or
/// the default directory, in that order.
///
/// # Errors
///
/// Returns an error if no override is given and the home directory is unknown.
pub fn resolve_config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    resolve_config_path_with(explicit, |key| std::env::var(key).ok())
}

fn resolve_config_path_with(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(config_dir()?.join("courier.toml"))
}
