//! Error types for the session layer.

/// Errors that can occur during session management.
///
/// None of these mean "the client is not logged in": an unknown token is
/// reported as `None` from [`SessionStore::lookup`](crate::SessionStore::lookup),
/// and bad credentials as `None` from
/// [`CredentialVerifier::verify`](crate::CredentialVerifier::verify).
/// Everything here is an infrastructure fault.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The random source could not produce bytes for a new token.
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// A stored password hash could not be parsed.
    #[error("stored password hash for {username:?} is malformed: {reason}")]
    MalformedHash { username: String, reason: String },

    /// Hashing a password failed (bad parameters, for instance).
    #[error("password hashing failed: {0}")]
    Hashing(String),
}
