//! Resource client for the Fitbit Web API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use url::Url;

use crate::error::{OAuthError, Result};
use crate::oauth::OAuth2Refresher;
use crate::store::FileTokenStore;
use crate::token::{ClientCredentials, indent_json};
use crate::token_manager::{TokenManager, TokenManagerOptions};
use crate::transport::{Authorizer, AuthorizingTransport, HttpTransport};

/// Default timeout for every outbound request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Profile resource path.
pub const PROFILE_PATH: &str = "1/user/-/profile.json";

/// Build the shared HTTP client used for both token and resource requests.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OAuthError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Body of a resource response.
///
/// Successful JSON bodies are re-indented; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Where the client's tokens come from when built by [`ApiClient::connect`].
#[derive(Debug, Clone)]
pub enum Connection {
    /// Talk to the API directly with OAuth2 tokens from a file.
    Direct {
        credentials: ClientCredentials,
        tokens_file: PathBuf,
        initial_refresh_token: Option<String>,
    },
    /// Talk to a credential-gated proxy with Basic Auth.
    Proxy { username: String, password: String },
}

/// Thin client exposing resource fetches through an [`HttpTransport`].
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client whose requests go through an [`AuthorizingTransport`]
    /// over `http`.
    pub fn new(base_url: &str, http: reqwest::Client, authorizer: Authorizer) -> Result<Self> {
        let transport = AuthorizingTransport::new(authorizer, http.clone());
        Self::with_transport(base_url, http, Arc::new(transport))
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(
        base_url: &str,
        http: reqwest::Client,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        Ok(Self {
            http,
            transport,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Build the HTTP client, token manager and transport in one step.
    pub async fn connect(base_url: &str, connection: Connection, timeout: Duration) -> Result<Self> {
        let http = build_http_client(timeout)?;

        let authorizer = match connection {
            Connection::Direct {
                credentials,
                tokens_file,
                initial_refresh_token,
            } => {
                let options = TokenManagerOptions::new(
                    credentials,
                    Arc::new(FileTokenStore::new(tokens_file)),
                    Arc::new(OAuth2Refresher::new(http.clone(), base_url)),
                );
                let manager = match initial_refresh_token {
                    Some(token) => TokenManager::bootstrap(options, &token).await?,
                    None => TokenManager::initialize(options).await?,
                };
                Authorizer::DirectOAuth2(manager)
            }
            Connection::Proxy { username, password } => {
                Authorizer::proxy_basic_auth(username, password)
            }
        };

        Self::new(base_url, http, authorizer)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The authorizing transport, for callers that build their own requests.
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    /// Fetch the user's profile document.
    pub async fn fetch_profile(&self) -> Result<ApiResponse> {
        self.fetch(PROFILE_PATH).await
    }

    /// Fetch the sleep log for one calendar day.
    pub async fn fetch_sleep_log(&self, date: NaiveDate) -> Result<ApiResponse> {
        self.fetch(&sleep_log_path(date)).await
    }

    /// GET a path relative to the base URL.
    pub async fn fetch(&self, path: &str) -> Result<ApiResponse> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| OAuthError::Config(format!("invalid resource path '{}': {}", path, e)))?;

        let request = self.http.get(url).build()?;
        let response = self.transport.execute(request).await?;

        let status = response.status();
        let raw = response
            .bytes()
            .await
            .map_err(|e| OAuthError::Network(format!("Failed to read response: {}", e)))?;

        let body = if status.is_success() {
            indent_json(&raw)?
        } else {
            tracing::debug!(%status, "Upstream returned an error status");
            String::from_utf8_lossy(&raw).into_owned()
        };

        Ok(ApiResponse { status, body })
    }
}

/// Sleep log path for `date`.
pub fn sleep_log_path(date: NaiveDate) -> String {
    format!("1.2/user/-/sleep/date/{}.json", date.format("%Y-%m-%d"))
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&normalized)
        .map_err(|e| OAuthError::Config(format!("invalid base URL '{}': {}", base_url, e)))
}
