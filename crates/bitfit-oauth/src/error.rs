//! Error types for token handling and authorized requests.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while loading, refreshing, or using tokens.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Token file could not be read or written.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Payload was not valid JSON or lacked a required field.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The provider explicitly rejected the grant (e.g. revoked refresh token).
    #[error("Provider error: {0}")]
    Provider(String),

    /// Transport-level failure reaching the provider or the upstream API.
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid construction parameters.
    #[error("Config error: {0}")]
    Config(String),

    /// A background refresh task panicked or was aborted.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OAuthError {
    /// Whether this error can only be cleared by a human re-authorizing.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, OAuthError::Provider(_))
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        OAuthError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for OAuthError {
    fn from(e: serde_json::Error) -> Self {
        OAuthError::Decode(e.to_string())
    }
}
