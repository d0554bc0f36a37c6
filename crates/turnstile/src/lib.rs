//! # Turnstile
//!
//! A small HTTP API server whose only job is deciding who you are.
//!
//! Clients log in with a username and password and receive an opaque
//! session token in an `HttpOnly` cookie. Every protected request is
//! checked by the [`Gate`](gate::Gate): cookie → token → live session, or
//! a 401. Everything the server does is recorded in a bounded, in-memory
//! diagnostic log ([`turnstile_log::DiagnosticLog`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turnstile::prelude::*;
//!
//! # async fn start() -> Result<(), TurnstileError> {
//! let config = Config::load(std::path::Path::new("config.yaml"))?;
//! let server = TurnstileServer::builder().config(config).build().await?;
//! println!("listening on {}", server.local_addr()?);
//! server.run().await
//! # }
//! ```

pub mod api;
pub mod config;
mod error;
pub mod format;
pub mod gate;
mod server;

pub use error::{GateError, TurnstileError};
pub use server::{TurnstileServer, TurnstileServerBuilder};

pub mod prelude {
    pub use crate::config::{ApiConfig, Config, ConfigError};
    pub use crate::gate::{CookieSettings, CurrentSession, Gate, IssuedSession, require_session};
    pub use crate::{GateError, TurnstileError, TurnstileServer, TurnstileServerBuilder};
    pub use turnstile_log::{DiagnosticLayer, DiagnosticLog, Level, LogConfig};
    pub use turnstile_session::{
        Argon2Verifier, CredentialVerifier, Credentials, Identity, Session, SessionStore, UserId,
    };
}
