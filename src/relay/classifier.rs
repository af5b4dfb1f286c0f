//! Keyword-based importance heuristic for `important_only` mode.

use std::sync::Arc;

/// Keywords used when the config does not override them.
pub const DEFAULT_IMPORTANT_KEYWORDS: &[&str] = &[
    "joined",
    "left the game",
    "chat",
    "message",
    "said",
    "logged in",
];

/// Immutable, case-insensitive keyword set.
///
/// Built once at startup and shared by reference; cloning is an `Arc` bump.
#[derive(Debug, Clone)]
pub struct ImportantKeywords {
    lowered: Arc<[String]>,
}

impl ImportantKeywords {
    /// Build a keyword set. Blank entries are discarded.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lowered: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            lowered: lowered.into(),
        }
    }

    /// Whether `message` contains any keyword, ignoring case.
    ///
    /// An absent message is never important.
    pub fn is_important(&self, message: Option<&str>) -> bool {
        let Some(message) = message else {
            return false;
        };
        let haystack = message.to_lowercase();
        self.lowered.iter().any(|k| haystack.contains(k.as_str()))
    }

    /// Number of keywords in the set.
    pub fn len(&self) -> usize {
        self.lowered.len()
    }

    /// Whether the set is empty (nothing is ever important).
    pub fn is_empty(&self) -> bool {
        self.lowered.is_empty()
    }
}

impl Default for ImportantKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_IMPORTANT_KEYWORDS)
    }
}
