//! OAuth2 refresh-token grant against the provider's token endpoint.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::error::{OAuthError, Result};
use crate::token::{self, ClientCredentials, TokenRecord};

/// Fitbit Web API base URL.
pub const DEFAULT_API_URL: &str = "https://api.fitbit.com";

/// Path of the token endpoint, relative to the API base URL.
pub const TOKEN_PATH: &str = "/oauth2/token";

/// Build an `Authorization: Basic` value (RFC 7617).
pub fn basic_auth_value(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", username, password))
    )
}

// ============================================================================
// TokenRefresher Trait
// ============================================================================

/// Exchanges a refresh token for a new token pair.
///
/// Implementations are stateless and never retry.
#[async_trait]
pub trait TokenRefresher: Send + Sync + std::fmt::Debug {
    async fn refresh(
        &self,
        credentials: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenRecord>;
}

// ============================================================================
// OAuth2Refresher
// ============================================================================

/// Refresher that talks to the provider over HTTP.
#[derive(Debug, Clone)]
pub struct OAuth2Refresher {
    client: reqwest::Client,
    token_url: String,
}

impl OAuth2Refresher {
    /// Create a refresher for the token endpoint under `api_url`.
    pub fn new(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            token_url: format!("{}{}", api_url.trim_end_matches('/'), TOKEN_PATH),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Perform the grant and return the raw response body.
    pub async fn fetch_token_payload(
        &self,
        credentials: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<(reqwest::StatusCode, Vec<u8>)> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .header(
                AUTHORIZATION,
                basic_auth_value(&credentials.client_id, &credentials.client_secret),
            )
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&form)
            .send()
            .await
            .map_err(|e| OAuthError::Network(format!("Token refresh request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| OAuthError::Network(format!("Failed to read token response: {}", e)))?;

        Ok((status, body.to_vec()))
    }
}

#[async_trait]
impl TokenRefresher for OAuth2Refresher {
    async fn refresh(
        &self,
        credentials: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenRecord> {
        let (status, body) = self.fetch_token_payload(credentials, refresh_token).await?;

        match token::decode(&body) {
            Ok(record) => {
                tracing::debug!(%status, expiration = %record.expiration, "Token endpoint issued new tokens");
                Ok(record)
            }
            Err(OAuthError::Provider(message)) => {
                tracing::error!(%status, %message, "Token endpoint rejected the refresh grant");
                Err(OAuthError::Provider(message))
            }
            Err(OAuthError::Decode(message)) if !status.is_success() => Err(OAuthError::Decode(
                format!("token endpoint returned {}: {}", status, message),
            )),
            Err(e) => Err(e),
        }
    }
}
