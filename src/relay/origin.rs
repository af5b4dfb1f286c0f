//! Suppression of log lines produced by the relay's own delivery path.
//!
//! A failed Telegram send logs a warning; if that warning were forwarded it
//! would fail again and log again. Every record passes through
//! [`is_internal`] before any other filter.

/// Target used for every log line emitted while delivering batches.
pub const NOTIFIER_TARGET: &str = "courier::notifier";

/// Message fragments that only appear in the relay's own diagnostics.
pub const INTERNAL_MESSAGE_MARKERS: &[&str] = &[
    "failed to deliver log batch",
    "failed to send telegram message",
    "[telegram-console]",
    "failed to execute",
    "LogRelay",
];

/// Logger names (tracing targets) of the bot stack and the relay itself.
pub const INTERNAL_LOGGER_IDS: &[&str] = &[
    NOTIFIER_TARGET,
    "courier::relay",
    "teloxide",
    "reqwest",
    "hyper",
];

/// Whether a record originates from the notification subsystem.
///
/// Matches if the message contains a marker, or the logger name equals or
/// contains one of the bot-library identifiers.
pub fn is_internal(logger_name: Option<&str>, message: Option<&str>) -> bool {
    let marked = message.is_some_and(|msg| {
        INTERNAL_MESSAGE_MARKERS
            .iter()
            .any(|marker| msg.contains(marker))
    });
    if marked {
        return true;
    }

    logger_name.is_some_and(|name| INTERNAL_LOGGER_IDS.iter().any(|id| name.contains(id)))
}
