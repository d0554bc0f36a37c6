//! The log record and its one-line rendering.

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::Level;

/// A single recorded message.
///
/// Created by the [`DiagnosticLog`](crate::DiagnosticLog) at record time
/// and never modified afterwards. `file` and `line` point at the call site
/// that produced the message, or `"???"`/`0` when unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub file: &'static str,
    pub line: u32,
    /// Rendered text, newlines replaced by spaces.
    pub message: String,
}

/// Renders a message as a single console line:
///
/// ```text
/// 2024-04-01 10:26:33 INFO  crates/turnstile/src/api.rs:88: 200 36ms 127.0.0.1 POST /api/auth
/// ```
///
/// With `color` set, the level label is painted by severity: debug dimmed,
/// info blue, warn yellow, error and fatal red. Trace stays unpainted.
pub fn render_line(message: &LogMessage, color: bool) -> String {
    let label = format!("{:<5}", message.level.label());
    let label = if color {
        paint(message.level, &label)
    } else {
        label
    };

    format!(
        "{} {} {}:{}: {}",
        message.timestamp.format("%Y-%m-%d %H:%M:%S"),
        label,
        message.file,
        message.line,
        message.message
    )
}

fn paint(level: Level, label: &str) -> String {
    match level {
        Level::Trace => label.to_string(),
        Level::Debug => label.dimmed().to_string(),
        Level::Info => label.blue().to_string(),
        Level::Warn => label.yellow().to_string(),
        Level::Error | Level::Fatal => label.red().to_string(),
    }
}
