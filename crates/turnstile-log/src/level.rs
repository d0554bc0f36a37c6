//! Severity levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LogError;

/// How important a log message is.
///
/// Levels are totally ordered:
///
/// ```text
/// Trace < Debug < Info < Warn < Error < Fatal
/// ```
///
/// A log configured with threshold `L` records a message only if its
/// level is `>= L`. `Fatal` is the only level with a side effect beyond
/// recording: see [`DiagnosticLog::fatal`](crate::DiagnosticLog::fatal).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    /// All levels, lowest first.
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    /// Lowercase name, as accepted in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    /// Uppercase label used in rendered lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        Self::ALL
            .get(usize::from(raw))
            .copied()
            .unwrap_or(Self::Fatal)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            _ => Err(LogError::InvalidLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = LogError;

    fn try_from(value: String) -> Result<Self, LogError> {
        value.parse()
    }
}

/// `tracing` has no fatal level; its `ERROR` maps to [`Level::Error`].
impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering_is_trace_to_fatal() {
        for pair in Level::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} should be below {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("TRACE".parse::<Level>().unwrap(), Level::Trace);
        assert_eq!("Info".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("fatal".parse::<Level>().unwrap(), Level::Fatal);
    }

    #[test]
    fn test_from_str_accepts_warning_alias() {
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
    }

    #[test]
    fn test_from_str_unknown_returns_invalid_level() {
        let err = "verbose".parse::<Level>().unwrap_err();
        assert_eq!(err, LogError::InvalidLevel("verbose".into()));
        assert!(err.to_string().contains("trace, debug"));
    }

    #[test]
    fn test_try_from_string_parses_or_reports_level() {
        assert_eq!(Level::try_from("Error".to_string()), Ok(Level::Error));
        assert_eq!(
            Level::try_from("loud".to_string()),
            Err(LogError::InvalidLevel("loud".into()))
        );
    }

    #[test]
    fn test_from_u8_round_trips_discriminant() {
        for level in Level::ALL {
            assert_eq!(Level::from_u8(level as u8), level);
        }
    }

    #[test]
    fn test_display_and_label() {
        assert_eq!(Level::Warn.to_string(), "warn");
        assert_eq!(Level::Warn.label(), "WARN");
    }

    #[test]
    fn test_from_tracing_level() {
        assert_eq!(Level::from(tracing::Level::DEBUG), Level::Debug);
        assert_eq!(Level::from(tracing::Level::ERROR), Level::Error);
    }
}
