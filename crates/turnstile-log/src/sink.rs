//! Output targets for rendered log lines.

use std::io::{self, IsTerminal, Write};

use crate::{LogMessage, render_line};

/// Where the log renders each accepted message.
///
/// Called while the log's buffer lock is held, so the order in which a
/// sink sees messages is the order they sit in the buffer. Sinks must not
/// log back into the same [`DiagnosticLog`](crate::DiagnosticLog).
pub trait LogSink: Send + Sync + 'static {
    /// Writes one message. `color` is the log's color flag; the sink
    /// decides whether its target can actually show colors.
    fn write_line(&self, message: &LogMessage, color: bool);
}

/// Renders to stdout, but only when stdout is an interactive terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write_line(&self, message: &LogMessage, color: bool) {
        let stdout = io::stdout();
        if !stdout.is_terminal() {
            return;
        }
        let line = render_line(message, color);
        // A closed stdout is not the caller's problem.
        let _ = writeln!(stdout.lock(), "{line}");
    }
}

/// Discards everything. The buffer still records messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write_line(&self, _message: &LogMessage, _color: bool) {}
}
