//! Decorate-and-delegate HTTP transport.
//!
//! [`AuthorizingTransport`] sets the `Authorization` header chosen by its
//! [`Authorizer`] and hands the request to an inner [`HttpTransport`]. The
//! response, or transport error, is returned untouched.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};

use crate::error::{OAuthError, Result};
use crate::oauth::basic_auth_value;
use crate::token_manager::TokenManager;

/// Something that can send a fully built request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        reqwest::Client::execute(self, request)
            .await
            .map_err(OAuthError::from)
    }
}

/// How outbound requests are authorized.
#[derive(Debug, Clone)]
pub enum Authorizer {
    /// Bearer token from a [`TokenManager`], refreshed ahead of expiry.
    DirectOAuth2(TokenManager),
    /// Basic Auth against a credential-gated proxy that holds the tokens.
    ProxyBasicAuth { username: String, password: String },
}

impl Authorizer {
    pub fn proxy_basic_auth(username: impl Into<String>, password: impl Into<String>) -> Self {
        Authorizer::ProxyBasicAuth {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Replace any `Authorization` header on `request` with this authorizer's.
    pub async fn authorize(&self, request: &mut reqwest::Request) -> Result<()> {
        let value = match self {
            Authorizer::DirectOAuth2(manager) => {
                format!("Bearer {}", manager.access_token().await?)
            }
            Authorizer::ProxyBasicAuth { username, password } => {
                basic_auth_value(username, password)
            }
        };

        let mut header = HeaderValue::from_str(&value)
            .map_err(|e| OAuthError::Config(format!("invalid authorization header: {}", e)))?;
        header.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, header);
        Ok(())
    }
}

/// Transport that authorizes every request before delegating it.
#[derive(Debug, Clone)]
pub struct AuthorizingTransport<T = reqwest::Client> {
    authorizer: Authorizer,
    inner: T,
}

impl<T: HttpTransport> AuthorizingTransport<T> {
    pub fn new(authorizer: Authorizer, inner: T) -> Self {
        Self { authorizer, inner }
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for AuthorizingTransport<T> {
    async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response> {
        self.authorizer.authorize(&mut request).await?;
        tracing::debug!(method = %request.method(), url = %request.url(), "Sending authorized request");
        self.inner.execute(request).await
    }
}
