//! Forwarding handler and health route.
//!
//! Every authenticated request is replayed against the upstream base URL with
//! the same method, path, query, headers and body. Only `Host` is rewritten;
//! the caller's `Authorization` is dropped and the shared transport attaches
//! the bearer token. The upstream response is streamed back unchanged apart
//! from hop-by-hop headers.

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Uri, header},
    response::Response,
};
use serde::Serialize;
use url::Url;

use crate::error::{ProxyError, Result};
use crate::state::ProxyState;

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "bitfit-proxy";

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Liveness check. Needs no credentials and never contacts upstream.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Forwarding
// ─────────────────────────────────────────────────────────────────────────────

/// Forward one request upstream and relay the response.
pub async fn forward(State(state): State<ProxyState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let target = upstream_url(state.upstream(), &parts.uri);

    let body = axum::body::to_bytes(body, state.max_body_size())
        .await
        .map_err(|e| ProxyError::Body(e.to_string()))?;

    let mut outbound = reqwest::Request::new(parts.method.clone(), target);
    *outbound.headers_mut() = outbound_headers(&parts.headers);
    if let Some(host) = host_header(outbound.url()) {
        outbound.headers_mut().insert(header::HOST, host);
    }
    if !body.is_empty() {
        *outbound.body_mut() = Some(body.into());
    }

    tracing::debug!(method = %parts.method, path = %parts.uri.path(), "Forwarding request upstream");

    // Spawned so a disconnecting caller cannot cancel a refresh mid-flight.
    let transport = state.api().transport();
    let upstream = tokio::spawn(async move { transport.execute(outbound).await })
        .await
        .map_err(|e| ProxyError::Internal(format!("forwarding task failed: {}", e)))??;

    let status = upstream.status();
    let headers = strip_hop_by_hop(upstream.headers());

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Map an inbound URI onto the upstream base URL, keeping any base path.
pub fn upstream_url(base: &Url, uri: &Uri) -> Url {
    let mut url = base.clone();
    let path = format!("{}{}", base.path().trim_end_matches('/'), uri.path());
    url.set_path(&path);
    url.set_query(uri.query());
    url
}

fn host_header(url: &Url) -> Option<HeaderValue> {
    let host = url.host_str()?;
    let value = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).ok()
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Inbound headers minus hop-by-hop, `Host`, `Authorization` and
/// `Content-Length` (recomputed from the buffered body).
fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    inbound
        .iter()
        .filter(|(name, _)| {
            !is_hop_by_hop(name)
                && *name != header::HOST
                && *name != header::AUTHORIZATION
                && *name != header::CONTENT_LENGTH
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_keeps_path_and_query() {
        let base = Url::parse("https://api.fitbit.com/").unwrap();
        let uri: Uri = "/1.2/user/-/sleep/date/2019-09-16.json?timezone=UTC"
            .parse()
            .unwrap();
        assert_eq!(
            upstream_url(&base, &uri).as_str(),
            "https://api.fitbit.com/1.2/user/-/sleep/date/2019-09-16.json?timezone=UTC"
        );
    }

    #[test]
    fn test_upstream_url_with_base_path() {
        let base = Url::parse("http://127.0.0.1:8080/fitbit/").unwrap();
        let uri: Uri = "/1/user/-/profile.json".parse().unwrap();
        assert_eq!(
            upstream_url(&base, &uri).as_str(),
            "http://127.0.0.1:8080/fitbit/1/user/-/profile.json"
        );
    }

    #[test]
    fn test_host_header() {
        let url = Url::parse("https://api.fitbit.com/1/user").unwrap();
        assert_eq!(host_header(&url).unwrap(), "api.fitbit.com");

        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(host_header(&url).unwrap(), "127.0.0.1:8080");
    }

    #[test]
    fn test_outbound_headers_filtering() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("proxy.example.com"));
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        inbound.insert("accept-language", HeaderValue::from_static("en_US"));

        let outbound = outbound_headers(&inbound);
        assert_eq!(outbound.len(), 2);
        assert_eq!(outbound.get(header::ACCEPT).unwrap(), "application/json");
        assert_eq!(outbound.get("accept-language").unwrap(), "en_US");
    }

    #[test]
    fn test_response_headers_drop_hop_by_hop() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        upstream.insert("fitbit-rate-limit-remaining", HeaderValue::from_static("149"));

        let relayed = strip_hop_by_hop(&upstream);
        assert!(relayed.get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(relayed.get("fitbit-rate-limit-remaining").unwrap(), "149");
    }
}
