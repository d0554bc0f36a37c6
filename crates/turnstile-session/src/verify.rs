//! Credential verification: does this username/password pair belong to a
//! known user?
//!
//! The session layer doesn't decide how passwords are stored. It defines
//! the [`CredentialVerifier`] trait, called by the gate before any session
//! is created, and ships one implementation: [`Argon2Verifier`], which
//! checks passwords against Argon2id PHC strings such as
//!
//! ```text
//! $argon2id$v=19$m=8192,t=3,p=2$<salt>$<hash>
//! ```
//!
//! A mock verifier in tests, or an LDAP-backed one in production, plugs in
//! the same way.

use std::collections::HashMap;

use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};

use crate::{Credentials, EntropySource, Identity, OsEntropy, SessionError, UserId};

/// Checks submitted credentials and says who they belong to.
///
/// # Trait bounds
///
/// - `Send + Sync` → one verifier is shared by every request task.
/// - `'static` → it lives as long as the server.
///
/// Verification is deliberately slow CPU work, so the method is
/// synchronous; async callers should run it on a blocking thread.
///
/// # Example
///
/// ```rust
/// use turnstile_session::{CredentialVerifier, Credentials, Identity, SessionError, UserId};
///
/// /// Lets exactly one hard-coded user in. Only for development!
/// struct DevVerifier;
///
/// impl CredentialVerifier for DevVerifier {
///     fn verify(&self, credentials: &Credentials) -> Result<Option<Identity>, SessionError> {
///         let ok = credentials.username == "dev" && credentials.password == "dev";
///         Ok(ok.then(|| Identity { user_id: UserId(1), username: "dev".into() }))
///     }
/// }
/// ```
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Verifies the given credentials.
    ///
    /// # Returns
    /// - `Ok(Some(identity))`: the password matches
    /// - `Ok(None)`: unknown user or wrong password (indistinguishable)
    /// - `Err(_)`: the verifier itself is broken (e.g. a corrupt stored hash)
    fn verify(&self, credentials: &Credentials) -> Result<Option<Identity>, SessionError>;
}

// ---------------------------------------------------------------------------
// ArgonParams
// ---------------------------------------------------------------------------

/// Cost parameters for hashing new passwords.
///
/// Existing PHC strings carry their own parameters, so changing these only
/// affects hashes produced afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgonParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    /// Salt length in bytes.
    pub salt_len: usize,
    /// Hash output length in bytes.
    pub output_len: usize,
}

impl Default for ArgonParams {
    fn default() -> Self {
        Self {
            memory_kib: 8 * 1024,
            iterations: 3,
            parallelism: 2,
            salt_len: 16,
            output_len: 32,
        }
    }
}

impl ArgonParams {
    fn hasher(&self) -> Result<Argon2<'static>, SessionError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.output_len),
        )
        .map_err(|e| SessionError::Hashing(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hashes a password into an Argon2id PHC string with a fresh random salt.
///
/// # Errors
/// Returns [`SessionError::Hashing`] for invalid parameters and
/// [`SessionError::Entropy`] if no salt could be drawn.
pub fn hash_password(password: &str, params: &ArgonParams) -> Result<String, SessionError> {
    let mut salt_bytes = vec![0u8; params.salt_len];
    OsEntropy.fill(&mut salt_bytes)?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| SessionError::Hashing(e.to_string()))?;

    let phc = params
        .hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| SessionError::Hashing(e.to_string()))?;
    Ok(phc.to_string())
}

// ---------------------------------------------------------------------------
// Argon2Verifier
// ---------------------------------------------------------------------------

struct StoredUser {
    user_id: UserId,
    phc: String,
}

/// Verifies credentials against an in-memory table of Argon2 PHC strings.
pub struct Argon2Verifier {
    users: HashMap<String, StoredUser>,

    /// Checked against when the username is unknown, so that a miss
    /// costs the same as a wrong password.
    dummy_phc: String,
}

impl Argon2Verifier {
    /// Creates a verifier with no users. `params` only shape the dummy
    /// hash used for unknown usernames; use the same params as real users.
    ///
    /// # Errors
    /// Fails if the dummy hash cannot be produced.
    pub fn new(params: &ArgonParams) -> Result<Self, SessionError> {
        Ok(Self {
            users: HashMap::new(),
            dummy_phc: hash_password("turnstile-dummy-password", params)?,
        })
    }

    /// Adds (or replaces) a user.
    ///
    /// # Errors
    /// Returns [`SessionError::MalformedHash`] if `phc` isn't a valid PHC
    /// string.
    pub fn add_user(
        &mut self,
        user_id: UserId,
        username: &str,
        phc: impl Into<String>,
    ) -> Result<(), SessionError> {
        let phc = phc.into();
        PasswordHash::new(&phc).map_err(|e| SessionError::MalformedHash {
            username: username.to_string(),
            reason: e.to_string(),
        })?;

        self.users
            .insert(username.to_string(), StoredUser { user_id, phc });
        Ok(())
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn matches(username: &str, phc: &str, password: &str) -> Result<bool, SessionError> {
        let malformed = |e: password_hash::Error| SessionError::MalformedHash {
            username: username.to_string(),
            reason: e.to_string(),
        };
        let hash = PasswordHash::new(phc).map_err(malformed)?;

        match Argon2::default().verify_password(password.as_bytes(), &hash) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(malformed(e)),
        }
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn verify(&self, credentials: &Credentials) -> Result<Option<Identity>, SessionError> {
        let Some(user) = self.users.get(&credentials.username) else {
            Self::matches("", &self.dummy_phc, &credentials.password)?;
            tracing::debug!(username = %credentials.username, "unknown user");
            return Ok(None);
        };

        if Self::matches(&credentials.username, &user.phc, &credentials.password)? {
            Ok(Some(Identity {
                user_id: user.user_id,
                username: credentials.username.clone(),
            }))
        } else {
            tracing::debug!(username = %credentials.username, "password mismatch");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so tests don't spend seconds hashing.
    fn fast() -> ArgonParams {
        ArgonParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
            ..ArgonParams::default()
        }
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    fn verifier_with_alice() -> Argon2Verifier {
        let mut verifier = Argon2Verifier::new(&fast()).unwrap();
        let phc = hash_password("correct horse", &fast()).unwrap();
        verifier.add_user(UserId(42), "alice", phc).unwrap();
        verifier
    }

    #[test]
    fn test_hash_password_produces_argon2id_phc() {
        let phc = hash_password("secret", &fast()).unwrap();

        assert!(phc.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"), "{phc}");
    }

    #[test]
    fn test_hash_password_salts_each_hash() {
        let a = hash_password("secret", &fast()).unwrap();
        let b = hash_password("secret", &fast()).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_password_invalid_params_returns_error() {
        let params = ArgonParams {
            parallelism: 0,
            ..fast()
        };

        assert!(matches!(
            hash_password("secret", &params),
            Err(SessionError::Hashing(_))
        ));
    }

    #[test]
    fn test_verify_correct_password_returns_identity() {
        let verifier = verifier_with_alice();

        let identity = verifier.verify(&creds("alice", "correct horse")).unwrap();

        assert_eq!(
            identity,
            Some(Identity {
                user_id: UserId(42),
                username: "alice".into()
            })
        );
    }

    #[test]
    fn test_verify_wrong_password_returns_none() {
        let verifier = verifier_with_alice();

        assert_eq!(verifier.verify(&creds("alice", "battery staple")).unwrap(), None);
    }

    #[test]
    fn test_verify_unknown_user_returns_none() {
        let verifier = verifier_with_alice();

        assert_eq!(verifier.verify(&creds("mallory", "correct horse")).unwrap(), None);
    }

    #[test]
    fn test_add_user_malformed_hash_returns_error() {
        let mut verifier = Argon2Verifier::new(&fast()).unwrap();

        let result = verifier.add_user(UserId(1), "bob", "not a phc string");

        assert!(matches!(
            result,
            Err(SessionError::MalformedHash { username, .. }) if username == "bob"
        ));
        assert!(verifier.is_empty());
    }

    #[test]
    fn test_argon_params_default_matches_documented_costs() {
        let params = ArgonParams::default();
        assert_eq!(params.memory_kib, 8192);
        assert_eq!(params.iterations, 3);
        assert_eq!(params.parallelism, 2);
        assert_eq!(params.salt_len, 16);
        assert_eq!(params.output_len, 32);
    }
}
