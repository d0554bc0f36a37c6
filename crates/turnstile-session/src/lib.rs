//! Session management for Turnstile.
//!
//! This crate owns the server-side half of authentication:
//!
//! 1. **Verification**: checking a username/password pair
//!    ([`CredentialVerifier`] trait, [`Argon2Verifier`])
//! 2. **Session tracking**: knowing which tokens are live ([`SessionStore`])
//! 3. **Token issuance**: drawing high-entropy bearer tokens from an
//!    [`EntropySource`]
//!
//! # How it fits in the stack
//!
//! ```text
//! HTTP API (above)  ← login / logout / protected routes
//!     ↕
//! Gate (above)      ← cookie → token → Session
//!     ↕
//! Session Layer (this crate)  ← token registry and credential checks
//! ```

mod entropy;
mod error;
mod session;
mod store;
mod verify;

pub use entropy::{EntropySource, OsEntropy};
pub use error::SessionError;
pub use session::{Credentials, Identity, Session, SessionToken, UserId, is_well_formed_token};
pub use store::SessionStore;
pub use verify::{Argon2Verifier, ArgonParams, CredentialVerifier, hash_password};
