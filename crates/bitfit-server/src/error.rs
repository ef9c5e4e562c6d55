//! Error types for the proxy.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bitfit_oauth::OAuthError;

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors raised while forwarding a request or running the listener.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Inbound body could not be read or was too large.
    #[error("failed to read request body: {0}")]
    Body(String),

    /// The upstream round trip failed, including a failed token refresh.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] OAuthError),

    /// Startup parameters are unusable (bad TLS material, bad address).
    #[error("configuration error: {0}")]
    Config(String),

    /// Listener failed to bind or stopped with an error.
    #[error("server error: {0}")]
    Serve(String),

    /// A spawned round trip panicked or a response could not be built.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::Body(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Config(_) | ProxyError::Serve(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        match &self {
            ProxyError::Upstream(e) if e.requires_reauthorization() => {
                tracing::error!(error = %self, "Refresh token rejected, re-authorization required");
            }
            ProxyError::Body(_) => tracing::debug!(error = %self, "Bad inbound request"),
            _ => tracing::error!(status = %status, error = %self, "Proxy error"),
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", status.canonical_reason().unwrap_or("Error")),
        )
            .into_response()
    }
}
