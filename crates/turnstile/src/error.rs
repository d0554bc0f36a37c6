//! Error types for the gate and the server.

use turnstile_log::LogError;
use turnstile_session::SessionError;

use crate::config::ConfigError;

/// Why the gate refused (or failed to handle) a request.
///
/// The first three variants mean "the client is not authenticated" and
/// become 401 responses. Everything else is a server-side fault and
/// becomes a 500.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The request carries no session cookie, or one whose value isn't
    /// shaped like a token.
    #[error("session cookie not found")]
    NoCredential,

    /// The cookie holds a well-formed token that maps to no live session.
    #[error("invalid token: unable to map token to session")]
    UnknownToken,

    /// Login with a wrong username or password.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The session layer failed (entropy, corrupt password hash).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The credential check couldn't run to completion.
    #[error("credential verification task failed: {0}")]
    VerifierTask(String),

    /// The configured cookie attributes don't form a valid header.
    #[error("cannot build session cookie: {0}")]
    Cookie(String),

    /// A handler asked for the current session, but none was attached.
    /// The route is missing the `require_session` middleware: a wiring
    /// bug, not a client error.
    #[error("no session attached to request (route not behind require_session)")]
    MissingIdentity,
}

impl GateError {
    /// Returns `true` for the kinds that mean "not logged in".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::NoCredential | Self::UnknownToken | Self::InvalidCredentials
        )
    }
}

/// Top-level error for starting and running a server.
///
/// The `#[from]` attributes let `?` lift errors from every layer.
#[derive(Debug, thiserror::Error)]
pub enum TurnstileError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Log(#[from] LogError),

    /// Binding or serving the listener failed.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unauthenticated_kinds() {
        assert!(GateError::NoCredential.is_unauthenticated());
        assert!(GateError::UnknownToken.is_unauthenticated());
        assert!(GateError::InvalidCredentials.is_unauthenticated());
        assert!(!GateError::MissingIdentity.is_unauthenticated());
        assert!(!GateError::Session(SessionError::Entropy("x".into())).is_unauthenticated());
    }

    #[test]
    fn test_no_credential_and_unknown_token_render_differently() {
        assert_ne!(
            GateError::NoCredential.to_string(),
            GateError::UnknownToken.to_string()
        );
    }

    #[test]
    fn test_from_session_error() {
        let err: GateError = SessionError::Entropy("drained".into()).into();
        assert!(matches!(err, GateError::Session(_)));
        assert!(err.to_string().contains("drained"));
    }

    #[test]
    fn test_from_config_error() {
        let err: TurnstileError = ConfigError::Invalid("bad".into()).into();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_from_log_error() {
        let err: TurnstileError = LogError::ZeroCapacity.into();
        assert!(matches!(err, TurnstileError::Log(_)));
    }
}
