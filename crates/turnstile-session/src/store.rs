//! The session store: the registry of every live session.
//!
//! This is the single source of truth for "is this token valid". It's
//! responsible for:
//! - Issuing a fresh token when a user logs in
//! - Resolving a token back to its session
//! - Forgetting a session when its user logs out
//!
//! # Concurrency note
//!
//! Unlike a manager owned by one task, the store is shared by every
//! request task, so it synchronizes internally with a
//! `parking_lot::RwLock`. Each operation holds the lock for its whole
//! read-modify-write and never across an `.await`, so readers never see a
//! half-inserted session and each token's transitions are linearizable.

use std::collections::HashMap;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::session::TOKEN_LEN;
use crate::{EntropySource, OsEntropy, Session, SessionError, SessionToken, UserId};

/// Number of random bytes hashed into each token.
const TOKEN_ENTROPY_BYTES: usize = 128;

/// Registry of live sessions, keyed by token.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ [live] ──→ revoke() ──→ [gone]
///                 │
///                 └── lookup() (any number of times)
/// ```
///
/// Sessions stay live until revoked; there is no expiry.
pub struct SessionStore {
    /// All live sessions. A token present here resolves to exactly one
    /// session, and a token is never handed out twice.
    sessions: RwLock<HashMap<SessionToken, Session>>,

    entropy: Box<dyn EntropySource>,
}

impl SessionStore {
    /// Creates an empty store drawing tokens from the OS random source.
    pub fn new() -> Self {
        Self::with_entropy(OsEntropy)
    }

    /// Creates an empty store drawing tokens from `entropy`.
    pub fn with_entropy(entropy: impl EntropySource) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            entropy: Box::new(entropy),
        }
    }

    /// Creates a session for a user who just proved their identity.
    ///
    /// # Errors
    /// Returns [`SessionError::Entropy`] if no token could be generated.
    pub fn create(&self, user_id: UserId, username: &str) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write();

        // Tokens never repeat across live sessions.
        let token = loop {
            let candidate = generate_token(self.entropy.as_ref())?;
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = Session {
            user_id,
            username: username.to_string(),
            token: token.clone(),
        };
        sessions.insert(token, session.clone());

        tracing::info!(%user_id, %username, "session created");
        Ok(session)
    }

    /// Looks up the session for a token.
    ///
    /// Returns `None` if the token is not live.
    pub fn lookup(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read();
        sessions.get(token).cloned()
    }

    /// Removes the session for a token, returning it.
    ///
    /// Revoking a token that isn't live does nothing and returns `None`.
    pub fn revoke(&self, token: &str) -> Option<Session> {
        let removed = self.sessions.write().remove(token);
        if let Some(session) = &removed {
            tracing::info!(user_id = %session.user_id, "session revoked");
        }
        removed
    }

    /// Removes every session belonging to a user. Returns how many were
    /// removed.
    pub fn revoke_user(&self, user_id: UserId) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        let removed = before - sessions.len();

        tracing::info!(%user_id, count = removed, "user sessions revoked");
        removed
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates a 64-character hex token: the SHA-256 digest of 128 random
/// bytes.
fn generate_token(entropy: &dyn EntropySource) -> Result<SessionToken, SessionError> {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    entropy.fill(&mut bytes)?;

    let digest = Sha256::digest(bytes);
    let hex = hex::encode(digest);
    debug_assert_eq!(hex.len(), TOKEN_LEN);
    Ok(SessionToken::new(hex))
}

// =========================================================================
// Tests
// =========================================================================
