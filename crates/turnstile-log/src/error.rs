//! Error types for the diagnostic log.

/// Errors raised while configuring a [`DiagnosticLog`](crate::DiagnosticLog).
///
/// Once a log exists it never reports errors back to its callers; these
/// only come out of construction and level parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// The ring buffer must be able to hold at least one message.
    #[error("log capacity must be at least 1")]
    ZeroCapacity,

    /// A level name that doesn't match any [`Level`](crate::Level).
    #[error(
        "invalid log level {0:?}, use one of trace, debug, info, warn, error, fatal (case insensitive)"
    )]
    InvalidLevel(String),
}
