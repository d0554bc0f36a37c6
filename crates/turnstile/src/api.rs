//! HTTP surface: the `/api/auth` routes, error responses, and the
//! middleware every request passes through.
//!
//! | Method | Path        | Auth | Effect                                 |
//! |--------|-------------|------|----------------------------------------|
//! | POST   | `/api/auth` | no   | log in, set the session cookie         |
//! | GET    | `/api/auth` | yes  | 200 if the cookie maps to a session    |
//! | DELETE | `/api/auth` | yes  | log out, clear the session cookie      |
//!
//! All paths live under the configured base path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::HttpBody;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::{Method, StatusCode};
use axum::http::header::SET_COOKIE;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::oneshot;
use turnstile_session::Credentials;

use crate::GateError;
use crate::config::ApiConfig;
use crate::format::{Unit, bytes_to_size, format_duration};
use crate::gate::{CurrentSession, Gate, require_session};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An error on its way to becoming an HTTP response.
///
/// Clients get a generic message (`{"error":"unauthorized"}`); the detail
/// only goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Gate(#[from] GateError),

    /// The login body isn't the expected JSON.
    #[error("bad request body: {0}")]
    Body(#[from] JsonRejection),

    #[error("request timed out")]
    Timeout,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Gate(e) if e.is_unauthenticated() => StatusCode::UNAUTHORIZED,
            Self::Gate(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn public_message(&self) -> &'static str {
        match self.status() {
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::BAD_REQUEST => "bad request",
            StatusCode::SERVICE_UNAVAILABLE => "request timed out",
            _ => "internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn login(
    State(gate): State<Arc<Gate>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(credentials) = body?;

    // Password hashing is slow CPU work; keep it off the async workers.
    // If this handler is dropped (request timeout) while the check runs,
    // the receiver is gone and the new session is revoked at once.
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let result = gate.issue_session(&credentials);
        if let Err(Ok(orphan)) = tx.send(result) {
            gate.store().revoke(orphan.session.token.as_str());
            tracing::warn!(user_id = %orphan.session.user_id, "login abandoned by client, session revoked");
        }
    });
    let issued = rx
        .await
        .map_err(|e| GateError::VerifierTask(e.to_string()))??;

    Ok(([(SET_COOKIE, issued.set_cookie)], Json(json!({}))))
}

async fn check(CurrentSession(session): CurrentSession) -> Json<serde_json::Value> {
    tracing::debug!(user_id = %session.user_id, "session check");
    Json(json!({}))
}

async fn logout(
    State(gate): State<Arc<Gate>>,
    CurrentSession(session): CurrentSession,
) -> Result<impl IntoResponse, ApiError> {
    let clear = gate.revoke_session(&session)?;
    Ok(([(SET_COOKIE, clear)], Json(json!({}))))
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Logs one line per request:
/// `<status> <latency> <client> <method> <path> <response size>`.
///
/// Severity follows the status: info below 400, warn for 4xx, error for
/// 5xx.
async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_string(), |ConnectInfo(addr)| addr.ip().to_string());

    let response = next.run(request).await;

    let status = response.status();
    let line = request_line(
        status,
        start.elapsed(),
        &client,
        &method,
        &path,
        response.body().size_hint().exact(),
    );
    if status.is_server_error() {
        tracing::error!("{line}");
    } else if status.is_client_error() {
        tracing::warn!("{line}");
    } else {
        tracing::info!("{line}");
    }
    response
}

/// A streamed body of unknown length shows as `-`.
fn request_line(
    status: StatusCode,
    latency: Duration,
    client: &str,
    method: &Method,
    path: &str,
    body_len: Option<u64>,
) -> String {
    let latency = format_duration(latency, Unit::Millis);
    let size = body_len.map_or_else(|| "-".to_string(), bytes_to_size);
    format!("{} {latency} {client} {method} {path} {size}", status.as_u16())
}

async fn enforce_timeout(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    tokio::time::timeout(limit, next.run(request))
        .await
        .map_err(|_| ApiError::Timeout)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Builds the application router.
pub fn router(gate: Arc<Gate>, api: &ApiConfig) -> Router {
    let protected = Router::new()
        .route("/api/auth", get(check).delete(logout))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&gate),
            require_session,
        ));

    let routes = Router::new()
        .route("/api/auth", post(login))
        .merge(protected)
        .with_state(gate);

    let routes = match api.route_prefix() {
        "" => routes,
        prefix => Router::new().nest(prefix, routes),
    };

    routes
        .layer(DefaultBodyLimit::max(api.max_body_bytes))
        .layer(middleware::from_fn_with_state(
            api.request_timeout(),
            enforce_timeout,
        ))
        .layer(middleware::from_fn(log_request))
}
