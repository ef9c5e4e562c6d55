//! Basic Auth gate in front of the forwarding handler.
//!
//! # Security
//!
//! Username and password are both compared in constant time, and both
//! comparisons always run.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use subtle::ConstantTimeEq;

use crate::state::ProxyState;

/// Realm sent in the `WWW-Authenticate` challenge.
pub const REALM: &str = "bitfit";

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

/// Username and password a caller must present to use the proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

impl ProxyCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Error
// ─────────────────────────────────────────────────────────────────────────────

/// Why a caller was turned away, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("basic HTTP authentication is required (RFC 7617)")]
    MissingBasicAuth,
    #[error("username in basic authentication is required (RFC 7617)")]
    MissingUsername,
    #[error("password in basic authentication is required (RFC 7617)")]
    MissingPassword,
    #[error("incorrect username or password")]
    InvalidCredentials,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    header::WWW_AUTHENTICATE,
                    format!("Basic realm=\"{}\"", REALM),
                ),
            ],
            format!("{}\n", self),
        )
            .into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Security Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Compare two strings in constant time.
///
/// A length mismatch still performs a same-length comparison before
/// returning false.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Extract `(username, password)` from a `Basic` Authorization header.
///
/// Returns `None` when the header is absent, uses another scheme, is not
/// valid base64, or has no `:` separator.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Validate a request's Basic Auth against `expected`.
pub fn check_basic_auth(headers: &HeaderMap, expected: &ProxyCredentials) -> Result<(), AuthError> {
    let (username, password) = basic_credentials(headers).ok_or(AuthError::MissingBasicAuth)?;

    if username.is_empty() {
        return Err(AuthError::MissingUsername);
    }
    if password.is_empty() {
        return Err(AuthError::MissingPassword);
    }

    let username_ok = constant_time_eq(&username, &expected.username);
    let password_ok = constant_time_eq(&password, &expected.password);
    if username_ok & password_ok {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Reject the request with 401 unless it carries the configured credentials.
pub async fn basic_auth_middleware(
    State(state): State<ProxyState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    if let Err(e) = check_basic_auth(request.headers(), state.credentials()) {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            reason = %e,
            "Rejected proxy caller"
        );
        return Err(e);
    }

    Ok(next.run(request).await)
}
