//! Capture mode: the single source of truth for whether logs are relayed.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Which records the relay captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogMode {
    /// Nothing is captured.
    Disabled,
    /// Only records the importance classifier accepts.
    #[default]
    ImportantOnly,
    /// Every record that is not internal.
    AllLogs,
}

impl LogMode {
    /// Persisted name, e.g. `IMPORTANT_ONLY`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "DISABLED",
            Self::ImportantOnly => "IMPORTANT_ONLY",
            Self::AllLogs => "ALL_LOGS",
        }
    }

    /// Whether any capture happens in this mode.
    pub fn is_enabled(self) -> bool {
        self != Self::Disabled
    }

    /// Parse a stored value, falling back to [`LogMode::ImportantOnly`].
    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::ImportantOnly => 1,
            Self::AllLogs => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Disabled,
            2 => Self::AllLogs,
            _ => Self::ImportantOnly,
        }
    }
}

impl fmt::Display for LogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognised mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log mode '{0}' (expected disabled, important_only or all_logs)")]
pub struct ParseModeError(pub String);

impl FromStr for LogMode {
    type Err = ParseModeError;

    /// Accepts the persisted names case-insensitively, plus the short CLI
    /// aliases `off`, `important` and `all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "DISABLED" | "OFF" => Ok(Self::Disabled),
            "IMPORTANT_ONLY" | "IMPORTANT" => Ok(Self::ImportantOnly),
            "ALL_LOGS" | "ALL" => Ok(Self::AllLogs),
            _ => Err(ParseModeError(s.to_owned())),
        }
    }
}

/// Lock-free holder for the current [`LogMode`], read on every record.
#[derive(Debug)]
pub struct ModeCell(AtomicU8);

impl ModeCell {
    /// Create a cell holding `mode`.
    pub fn new(mode: LogMode) -> Self {
        Self(AtomicU8::new(mode.to_u8()))
    }

    /// Current mode.
    pub fn get(&self) -> LogMode {
        LogMode::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Replace the mode, returning the previous one.
    pub fn replace(&self, mode: LogMode) -> LogMode {
        LogMode::from_u8(self.0.swap(mode.to_u8(), Ordering::AcqRel))
    }
}

impl Default for ModeCell {
    fn default() -> Self {
        Self::new(LogMode::default())
    }
}
