//! Bridge from `tracing` events into the [`DiagnosticLog`].
//!
//! Components log with the ordinary `tracing` macros. Installing a
//! [`DiagnosticLayer`] on the subscriber routes every event into the ring
//! buffer, attributed to the file and line of the macro call.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::{DiagnosticLog, Level};

/// A tracing layer that records events into a [`DiagnosticLog`].
///
/// Filtering happens in the log itself, so a threshold changed with
/// [`DiagnosticLog::set_level`] takes effect immediately.
///
/// ```rust
/// use std::sync::Arc;
/// use tracing_subscriber::layer::SubscriberExt;
/// use turnstile_log::{DiagnosticLayer, DiagnosticLog, LogConfig, NullSink};
///
/// let log = Arc::new(DiagnosticLog::with_sink(LogConfig::default(), NullSink).unwrap());
/// let subscriber = tracing_subscriber::registry().with(DiagnosticLayer::new(Arc::clone(&log)));
///
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!(user_id = 42, "session created");
/// });
/// assert_eq!(log.recent(1)[0].message, "session created user_id=42");
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosticLayer {
    log: Arc<DiagnosticLog>,
}

impl DiagnosticLayer {
    pub fn new(log: Arc<DiagnosticLog>) -> Self {
        Self { log }
    }
}

impl<S> Layer<S> for DiagnosticLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = Level::from(*metadata.level());
        if !self.log.enabled(level) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.log.record_at(
            level,
            metadata.file().unwrap_or("???"),
            metadata.line().unwrap_or(0),
            visitor.finish(),
        );
    }
}

/// Collects the `message` field plus every other field as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }

    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field, format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field, format_args!("{value:?}"));
        }
    }
}
