//! Credential-gated reverse proxy for the Fitbit Web API.
//!
//! Callers authenticate with HTTP Basic Auth; authenticated requests are
//! forwarded to the upstream API through a shared [`ApiClient`] whose
//! transport attaches (and refreshes) the OAuth2 bearer token. Callers never
//! see or hold provider tokens.
//!
//! # Example
//!
//! ```ignore
//! use bitfit_server::{ProxyCredentials, ProxyServer, ServerConfig};
//!
//! let config = ServerConfig::new(ProxyCredentials::new("alice", "pw"))
//!     .with_tls("cert.txt", "key.txt");
//! ProxyServer::new(api_client, config).run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod proxy;
pub mod state;

pub use auth::{AuthError, ProxyCredentials};
pub use config::{ServerConfig, TlsConfig};
pub use error::{ProxyError, Result};
pub use proxy::{HealthResponse, SERVICE_NAME};
pub use state::ProxyState;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{any, get},
};
use axum_server::tls_rustls::RustlsConfig;
use bitfit_oauth::ApiClient;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Grace period for in-flight requests on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// The credential-gated proxy.
pub struct ProxyServer {
    state: ProxyState,
    config: ServerConfig,
}

impl ProxyServer {
    /// Create a proxy that forwards through `api`.
    pub fn new(api: ApiClient, config: ServerConfig) -> Self {
        let state = ProxyState::new(api, config.credentials.clone(), config.max_body_size);
        Self { state, config }
    }

    /// Build the router: everything is forwarded behind Basic Auth except
    /// `/health`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", any(proxy::forward))
            .route("/{*path}", any(proxy::forward))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::basic_auth_middleware,
            ))
            // Added after the auth layer so it stays public.
            .route("/health", get(proxy::health))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run until Ctrl-C, over TLS when configured.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.bind_address;
        let router = self.router();

        match &self.config.tls {
            Some(tls) => {
                let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .await
                    .map_err(|e| {
                        ProxyError::Config(format!(
                            "failed to load TLS material from '{}' and '{}': {}",
                            tls.cert_path.display(),
                            tls.key_path.display(),
                            e
                        ))
                    })?;

                let handle = axum_server::Handle::new();
                let shutdown = handle.clone();
                tokio::spawn(async move {
                    shutdown_signal().await;
                    shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
                });

                info!("Starting proxy on https://{}", addr);
                axum_server::bind_rustls(addr, rustls)
                    .handle(handle)
                    .serve(router.into_make_service())
                    .await
                    .map_err(|e| ProxyError::Serve(format!("Server error: {}", e)))
            }
            None => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|e| ProxyError::Serve(format!("Failed to bind {}: {}", addr, e)))?;
                info!("Starting proxy on http://{}", addr);
                serve_plain(listener, router, shutdown_signal()).await
            }
        }
    }

    /// Serve plain HTTP on an already-bound listener until `shutdown`
    /// resolves (useful for testing).
    pub async fn run_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        if let Ok(addr) = listener.local_addr() {
            info!("Starting proxy on http://{}", addr);
        }
        serve_plain(listener, router, shutdown).await
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.config.bind_address
    }
}

async fn serve_plain<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ProxyError::Serve(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down proxy");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use bitfit_oauth::Authorizer;
    use tower::ServiceExt;

    fn test_server() -> ProxyServer {
        // Unroutable upstream: these tests must never reach it.
        let api = ApiClient::new(
            "http://127.0.0.1:9",
            reqwest::Client::new(),
            Authorizer::proxy_basic_auth("upstream", "unused"),
        )
        .unwrap();
        ProxyServer::new(api, ServerConfig::new(ProxyCredentials::new("alice", "pw")))
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let response = test_server()
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok", "service": "bitfit-proxy"}));
    }

    #[tokio::test]
    async fn test_root_requires_auth() {
        let response = test_server()
            .router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(body.to_vec()).unwrap(),
            "basic HTTP authentication is required (RFC 7617)\n"
        );
    }

    #[tokio::test]
    async fn test_missing_tls_material_fails_startup() {
        let api = ApiClient::new(
            "http://127.0.0.1:9",
            reqwest::Client::new(),
            Authorizer::proxy_basic_auth("upstream", "unused"),
        )
        .unwrap();
        let config = ServerConfig::new(ProxyCredentials::new("alice", "pw"))
            .with_bind_address("127.0.0.1:0".parse().unwrap())
            .with_tls("/nonexistent/cert.txt", "/nonexistent/key.txt");

        let result = ProxyServer::new(api, config).run().await;
        assert!(matches!(result, Err(ProxyError::Config(_))));
    }
}
