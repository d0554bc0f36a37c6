//! Server configuration, loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a working server on `127.0.0.1:8088`:
//!
//! ```yaml
//! api:
//!   address: 127.0.0.1:8088
//!   base_path: /
//!   cookie_name: session
//!   cookie_secure: true
//!   request_timeout_secs: 10
//!   max_body_bytes: 1048576
//! log:
//!   level: trace
//!   size: 32
//!   color: true
//! crypto:
//!   argon:
//!     memory_kib: 8192
//!     iterations: 3
//!     parallelism: 2
//!     salt_len: 16
//!     output_len: 32
//! users:
//!   - id: 42
//!     username: alice
//!     password_hash: $argon2id$v=19$...
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use turnstile_log::{Level, LogConfig};
use turnstile_session::{Argon2Verifier, ArgonParams, SessionError, UserId};

/// Errors from loading or validating a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file {0} not found")]
    NotFound(PathBuf),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub log: LogSettings,
    pub crypto: CryptoConfig,
    pub users: Vec<UserEntry>,
}

/// HTTP listener and session cookie settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// `host:port` to listen on.
    pub address: String,
    /// Prefix for every route, and the session cookie's `Path`.
    pub base_path: String,
    pub cookie_name: String,
    /// Adds `Secure` to the session cookie.
    pub cookie_secure: bool,
    /// Upper bound on handling one request, in seconds.
    pub request_timeout_secs: u64,
    /// Upper bound on a request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8088".to_string(),
            base_path: "/".to_string(),
            cookie_name: "session".to_string(),
            cookie_secure: true,
            request_timeout_secs: 10,
            max_body_bytes: 1 << 20,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base path without a trailing slash; the root is `""`.
    pub fn route_prefix(&self) -> &str {
        self.base_path.trim_end_matches('/')
    }
}

/// Diagnostic log settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: Level,
    /// Number of messages kept in memory.
    pub size: usize,
    pub color: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        let defaults = LogConfig::default();
        Self {
            level: defaults.level,
            size: defaults.capacity,
            color: defaults.color,
        }
    }
}

impl From<LogSettings> for LogConfig {
    fn from(settings: LogSettings) -> Self {
        Self {
            level: settings.level,
            capacity: settings.size,
            color: settings.color,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CryptoConfig {
    pub argon: ArgonParams,
}

/// A user allowed to log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string, as printed by `turnstile hash-password`.
    pub password_hash: String,
}

impl Config {
    /// Loads and validates a configuration file. Call
    /// [`trace_dump`](Self::trace_dump) once logging is up to record it.
    ///
    /// # Errors
    /// [`ConfigError::NotFound`] if the file doesn't exist, otherwise
    /// I/O, parse, or validation errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let config = Self::from_yaml(&text)?;
        tracing::trace!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses and validates YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty document parses as null rather than an empty mapping.
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde can't.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.log.size == 0 {
            return invalid("log.size must be at least 1");
        }
        if !self.api.base_path.starts_with('/') {
            return invalid("api.base_path must start with '/'");
        }
        if self.api.cookie_name.is_empty()
            || !self
                .api
                .cookie_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return invalid("api.cookie_name must be non-empty and alphanumeric");
        }
        if self.api.request_timeout_secs == 0 {
            return invalid("api.request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Builds the credential verifier for the configured users.
    ///
    /// # Errors
    /// Fails if a stored hash is malformed.
    pub fn verifier(&self) -> Result<Argon2Verifier, SessionError> {
        let mut verifier = Argon2Verifier::new(&self.crypto.argon)?;
        for user in &self.users {
            verifier.add_user(UserId(user.id), &user.username, user.password_hash.as_str())?;
        }
        Ok(verifier)
    }

    /// Users of this configuration whose credentials no longer hold in
    /// `next`: removed, renamed, or given a new password hash.
    pub fn stale_users(&self, next: &Config) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|user| !next.users.contains(user))
            .map(|user| UserId(user.id))
            .collect()
    }

    /// Writes the effective configuration to the log at trace level, one
    /// line per YAML line, with password hashes hidden.
    pub fn trace_dump(&self) {
        let mut shown = self.clone();
        for user in &mut shown.users {
            user.password_hash = "<redacted>".to_string();
        }
        match serde_yaml::to_string(&shown) {
            Ok(yaml) => {
                for line in yaml.trim_end().lines() {
                    tracing::trace!("{line}");
                }
            }
            Err(e) => tracing::error!(error = %e, "serializing configuration"),
        }
    }
}
