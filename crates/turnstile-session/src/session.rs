//! Session types: who is logged in, and the token that proves it.

use std::borrow::Borrow;
use std::fmt;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionToken
// ---------------------------------------------------------------------------

/// Length of a token in hex characters (a SHA-256 digest).
pub(crate) const TOKEN_LEN: usize = 64;

/// Opaque bearer token identifying a session.
///
/// 64 lowercase hex characters: the SHA-256 digest of 128 random bytes.
/// Anyone holding it is treated as the session's user, so `Debug` never
/// prints it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub(crate) fn new(hex: String) -> Self {
        debug_assert!(is_well_formed_token(&hex));
        Self(hex)
    }

    /// The token as sent to the client.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lets maps keyed by token be queried with a plain `&str`.
impl Borrow<str> for SessionToken {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Returns `true` if `candidate` has the shape of a token this crate
/// issues. Says nothing about whether the token is live.
pub fn is_well_formed_token(candidate: &str) -> bool {
    candidate.len() == TOKEN_LEN
        && candidate
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A live session: the binding of a token to a user.
///
/// Created by [`SessionStore::create`](crate::SessionStore::create) and
/// valid until revoked. Request handlers receive clones; the store keeps
/// the authoritative copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub token: SessionToken,
}

// ---------------------------------------------------------------------------
// Credentials / Identity
// ---------------------------------------------------------------------------

/// A login attempt, as submitted by the client.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Who a set of credentials belongs to, once verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_well_formed_token_accepts_lowercase_hex() {
        assert!(is_well_formed_token(&"a1".repeat(32)));
    }

    #[test]
    fn test_is_well_formed_token_rejects_bad_shapes() {
        assert!(!is_well_formed_token(""));
        assert!(!is_well_formed_token(&"a".repeat(63)));
        assert!(!is_well_formed_token(&"a".repeat(65)));
        assert!(!is_well_formed_token(&"A".repeat(64)));
        assert!(!is_well_formed_token(&"g".repeat(64)));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = SessionToken::new("0f".repeat(32));
        let debug = format!("{token:?}");
        assert!(!debug.contains("0f0f"), "{debug}");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId(42).to_string(), "user-42");
    }
}
