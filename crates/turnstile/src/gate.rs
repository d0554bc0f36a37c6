//! The authentication gate: from an inbound request to a [`Session`].
//!
//! Per request (nothing is remembered between requests):
//!
//! ```text
//! START ──→ cookie values ───┬─ none / malformed ──→ NoCredential
//!                            └─ token ──→ store lookup ──┬─ missing ──→ UnknownToken
//!                                                        └─ found ────→ Session
//! ```
//!
//! [`require_session`] wraps protected routes with this decision and
//! hands the session to handlers through the [`CurrentSession`]
//! extractor. Login and logout go through [`Gate::issue_session`] and
//! [`Gate::revoke_session`].

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::RwLock;
use turnstile_session::{
    CredentialVerifier, Credentials, Session, SessionError, SessionStore, is_well_formed_token,
};

use crate::GateError;
use crate::api::ApiError;
use crate::config::{ApiConfig, Config};

// ---------------------------------------------------------------------------
// CookieSettings
// ---------------------------------------------------------------------------

/// How the session token travels: a named, `HttpOnly`, `SameSite=Strict`
/// cookie scoped to the API base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    pub name: String,
    pub path: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

impl From<&ApiConfig> for CookieSettings {
    fn from(api: &ApiConfig) -> Self {
        Self {
            name: api.cookie_name.clone(),
            path: api.base_path.clone(),
            secure: api.cookie_secure,
        }
    }
}

impl CookieSettings {
    /// `Set-Cookie` value delivering `token` to the client.
    pub fn issue(&self, token: &str) -> Result<HeaderValue, GateError> {
        self.header(token, "")
    }

    /// `Set-Cookie` value telling the client to drop its cookie.
    pub fn clear(&self) -> Result<HeaderValue, GateError> {
        self.header("", "; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT")
    }

    fn header(&self, value: &str, expiry: &str) -> Result<HeaderValue, GateError> {
        let secure = if self.secure { "; Secure" } else { "" };
        let cookie = format!(
            "{}={value}; Path={}; HttpOnly; SameSite=Strict{secure}{expiry}",
            self.name, self.path
        );
        HeaderValue::from_str(&cookie).map_err(|e| GateError::Cookie(e.to_string()))
    }

    /// Every value of this cookie among the request's `Cookie` headers, in
    /// order.
    ///
    /// A client can hold several cookies of the same name (set for
    /// different paths), so there may be more than one. Headers that
    /// aren't valid UTF-8 are skipped.
    pub fn values<'a>(&'a self, headers: &'a HeaderMap) -> impl Iterator<Item = &'a str> + 'a {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(move |(name, _)| *name == self.name)
            .map(|(_, value)| value.trim())
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// A freshly created session and the cookie that carries it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub set_cookie: HeaderValue,
}

/// Decides who a request belongs to, and creates/destroys sessions.
///
/// Shared across request tasks as `Arc<Gate>`. The gate itself holds no
/// per-request state; the [`SessionStore`] is the only source of truth.
pub struct Gate {
    store: Arc<SessionStore>,

    /// Swappable so a configuration reload can change the user table
    /// without restarting.
    verifier: RwLock<Arc<dyn CredentialVerifier>>,

    cookie: CookieSettings,
}

impl Gate {
    pub fn new(
        store: Arc<SessionStore>,
        verifier: Arc<dyn CredentialVerifier>,
        cookie: CookieSettings,
    ) -> Self {
        Self {
            store,
            verifier: RwLock::new(verifier),
            cookie,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn cookie(&self) -> &CookieSettings {
        &self.cookie
    }

    /// Replaces the credential verifier. Existing sessions are kept.
    pub fn replace_verifier(&self, verifier: Arc<dyn CredentialVerifier>) {
        *self.verifier.write() = verifier;
    }

    /// Resolves the request's session cookie to a live session.
    ///
    /// When the cookie appears more than once, the first value that maps
    /// to a live session wins.
    ///
    /// # Errors
    /// - [`GateError::NoCredential`]: no cookie, or no value is a token
    /// - [`GateError::UnknownToken`]: tokens, but none a live session owns
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Session, GateError> {
        let mut saw_token = false;
        for token in self.cookie.values(headers).filter(|token| is_well_formed_token(token)) {
            saw_token = true;
            if let Some(session) = self.store.lookup(token) {
                return Ok(session);
            }
        }

        Err(if saw_token {
            GateError::UnknownToken
        } else {
            GateError::NoCredential
        })
    }

    /// Swaps in the user table of `next` and logs out every user whose
    /// credentials changed since `current`. Returns the number of sessions
    /// revoked.
    ///
    /// # Errors
    /// Fails, leaving users and sessions untouched, if `next` holds a
    /// malformed password hash.
    pub fn reload_users(&self, current: &Config, next: &Config) -> Result<usize, SessionError> {
        let verifier = next.verifier()?;
        self.replace_verifier(Arc::new(verifier));

        let revoked = current
            .stale_users(next)
            .into_iter()
            .map(|user_id| self.store.revoke_user(user_id))
            .sum();
        Ok(revoked)
    }

    /// Logs a user in: verifies the credentials, then creates a session.
    ///
    /// Runs the (slow) password check on the calling thread; call it from
    /// a blocking context.
    ///
    /// # Errors
    /// - [`GateError::InvalidCredentials`]: unknown user or wrong password
    /// - [`GateError::Session`]: the verifier or the store failed
    pub fn issue_session(&self, credentials: &Credentials) -> Result<IssuedSession, GateError> {
        let verifier = self.verifier.read().clone();
        let identity = verifier
            .verify(credentials)?
            .ok_or(GateError::InvalidCredentials)?;

        let session = self.store.create(identity.user_id, &identity.username)?;
        let set_cookie = self.cookie.issue(session.token.as_str())?;

        tracing::info!(user_id = %session.user_id, username = %session.username, "logged in");
        Ok(IssuedSession {
            session,
            set_cookie,
        })
    }

    /// Logs a session out and returns the cookie-clearing header.
    pub fn revoke_session(&self, session: &Session) -> Result<HeaderValue, GateError> {
        self.store.revoke(session.token.as_str());
        tracing::info!(user_id = %session.user_id, "logged out");
        self.cookie.clear()
    }
}

// ---------------------------------------------------------------------------
// Middleware / extractor
// ---------------------------------------------------------------------------

/// Middleware for protected routes.
///
/// Unauthenticated requests stop here with a 401, gate failures with a
/// 500. Otherwise the [`Session`] is stored in the request extensions for
/// [`CurrentSession`] and the request continues.
pub async fn require_session(
    State(gate): State<Arc<Gate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = gate.authenticate(request.headers())?;
    tracing::trace!(user_id = %session.user_id, path = %request.uri().path(), "authenticated");

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// The session of the request, as attached by [`require_session`].
///
/// Using this on a route without the middleware is a wiring bug: it is
/// reported as [`GateError::MissingIdentity`] and answered with a 500.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(CurrentSession)
            .ok_or(ApiError::Gate(GateError::MissingIdentity))
    }
}

// =========================================================================
// Tests
// =========================================================================
