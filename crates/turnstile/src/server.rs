//! `TurnstileServer` builder and serve loop.
//!
//! Ties the layers together: configuration → credential verifier and
//! session store → gate → router → listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use turnstile_session::{CredentialVerifier, SessionStore};

use crate::TurnstileError;
use crate::api;
use crate::config::Config;
use crate::gate::{CookieSettings, Gate};

/// Builder for configuring and starting a Turnstile server.
///
/// # Example
///
/// ```rust,no_run
/// use turnstile::prelude::*;
///
/// # async fn start() -> Result<(), TurnstileError> {
/// let server = TurnstileServer::builder()
///     .config(Config::from_yaml("api:\n  address: 0.0.0.0:8088\n")?)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct TurnstileServerBuilder {
    config: Config,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    store: Option<Arc<SessionStore>>,
}

impl TurnstileServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            verifier: None,
            store: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Overrides the address from the configuration.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.api.address = addr.to_string();
        self
    }

    /// Uses `verifier` instead of one built from the configured users.
    pub fn verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Shares an existing session store.
    pub fn store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Binds the listener and assembles the router.
    ///
    /// # Errors
    /// Fails if the configured users can't be loaded or the address can't
    /// be bound.
    pub async fn build(self) -> Result<TurnstileServer, TurnstileError> {
        let verifier = match self.verifier {
            Some(verifier) => verifier,
            None => Arc::new(self.config.verifier()?),
        };
        let store = self.store.unwrap_or_default();

        let gate = Arc::new(Gate::new(
            store,
            verifier,
            CookieSettings::from(&self.config.api),
        ));
        let router = api::router(Arc::clone(&gate), &self.config.api);
        let listener = TcpListener::bind(&self.config.api.address).await?;

        Ok(TurnstileServer {
            listener,
            router,
            gate,
        })
    }
}

impl Default for TurnstileServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Turnstile server.
///
/// Call [`run()`](Self::run) to start accepting requests.
pub struct TurnstileServer {
    listener: TcpListener,
    router: Router,
    gate: Arc<Gate>,
}

impl TurnstileServer {
    /// Creates a new builder.
    pub fn builder() -> TurnstileServerBuilder {
        TurnstileServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The gate serving this server's requests.
    pub fn gate(&self) -> &Arc<Gate> {
        &self.gate
    }

    /// Serves requests until the process is terminated.
    pub async fn run(self) -> Result<(), TurnstileError> {
        tracing::info!(addr = %self.local_addr()?, "turnstile server running");

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }
}
