//! `tracing` integration: feeds every event of the host process to a relay.
//!
//! [`RelayLayer`] is installed once in the subscriber stack. It forwards
//! events only while the relay is attached, so `start`/`stop` on the relay
//! act as attach/detach without touching the global subscriber.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::relay::{LogRelay, LogRecord};

/// Subscriber layer that turns tracing events into [`LogRecord`]s.
#[derive(Debug, Clone)]
pub struct RelayLayer {
    relay: Arc<LogRelay>,
}

impl RelayLayer {
    /// Wrap a shared relay.
    pub fn new(relay: Arc<LogRelay>) -> Self {
        Self { relay }
    }
}

impl<S: Subscriber> Layer<S> for RelayLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.relay.is_attached() || !self.relay.is_logs_enabled() {
            return;
        }
        let record = record_from_event(event);
        self.relay.on_record(&record);
    }
}

/// Build a record from an event: level, target as logger name, and the
/// `message` field followed by the remaining fields as `key=value`.
pub fn record_from_event(event: &Event<'_>) -> LogRecord {
    let metadata = event.metadata();
    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);

    LogRecord {
        level: metadata.level().to_string(),
        logger_name: Some(metadata.target().to_owned()),
        message: visitor.finish(),
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, name: &str, value: std::fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }

    fn finish(self) -> Option<String> {
        match (self.message, self.fields.is_empty()) {
            (Some(message), true) => Some(message),
            (Some(message), false) => Some(format!("{message} {}", self.fields)),
            (None, false) => Some(self.fields),
            (None, true) => None,
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}
