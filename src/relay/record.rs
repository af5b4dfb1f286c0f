//! Raw log records as delivered by the host log stream.

/// One emitted log line, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity label, e.g. `INFO` or `WARN`.
    pub level: String,
    /// Origin identifier (tracing target or logger name).
    pub logger_name: Option<String>,
    /// Raw text.
    pub message: Option<String>,
}

impl LogRecord {
    /// Build a record with a logger name and message.
    pub fn new(
        level: impl Into<String>,
        logger_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level: level.into(),
            logger_name: Some(logger_name.into()),
            message: Some(message.into()),
        }
    }

    /// Render the queued form `[LEVEL] message`.
    ///
    /// An absent message renders as empty text.
    pub fn format_line(&self) -> String {
        format!(
            "[{}] {}",
            self.level,
            self.message.as_deref().unwrap_or_default()
        )
    }
}
