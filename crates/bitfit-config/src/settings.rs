//! Raw settings as read from flags, environment and the JSON config file.
//!
//! Every field is optional here; the typed views in [`crate::resolved`] decide
//! what each command actually requires.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// One layer of settings. JSON keys match the command-line flag names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OAuth2 client id.
    pub id: Option<String>,
    /// OAuth2 client secret.
    pub secret: Option<String>,
    /// Initial refresh token used to create a tokens file.
    pub refreshtoken: Option<String>,
    /// Path of the persisted token record.
    pub tokensfile: Option<PathBuf>,
    /// Base URL of a credential-gated proxy.
    pub url: Option<String>,
    /// Basic Auth username (proxy callers).
    pub username: Option<String>,
    /// Basic Auth password (proxy callers).
    pub password: Option<String>,
    /// TLS certificate chain, PEM.
    pub certfile: Option<PathBuf>,
    /// TLS private key, PEM.
    pub keyfile: Option<PathBuf>,
    /// Listen address, e.g. `:9090`.
    pub port: Option<String>,
    /// Outbound request timeout in seconds.
    pub timeout: Option<u64>,
    /// Upstream provider base URL.
    pub apiurl: Option<String>,
}

impl Settings {
    /// Load a JSON config file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Fill every unset field of `self` from `fallback`.
    ///
    /// Empty strings count as unset, so an exported-but-empty environment
    /// variable does not shadow the config file.
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            id: pick(self.id, fallback.id),
            secret: pick(self.secret, fallback.secret),
            refreshtoken: pick(self.refreshtoken, fallback.refreshtoken),
            tokensfile: pick_path(self.tokensfile, fallback.tokensfile),
            url: pick(self.url, fallback.url),
            username: pick(self.username, fallback.username),
            password: pick(self.password, fallback.password),
            certfile: pick_path(self.certfile, fallback.certfile),
            keyfile: pick_path(self.keyfile, fallback.keyfile),
            port: pick(self.port, fallback.port),
            timeout: self.timeout.or(fallback.timeout),
            apiurl: pick(self.apiurl, fallback.apiurl),
        }
    }

    /// Merge with the config file at `path`, if one is given. Empty values
    /// are dropped either way.
    pub fn with_file(self, path: Option<&Path>) -> Result<Settings> {
        let fallback = match path {
            Some(path) => Settings::load_file(path)?,
            None => Settings::default(),
        };
        Ok(self.or(fallback))
    }
}

fn pick(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary
        .filter(|s| !s.is_empty())
        .or_else(|| fallback.filter(|s| !s.is_empty()))
}

fn pick_path(primary: Option<PathBuf>, fallback: Option<PathBuf>) -> Option<PathBuf> {
    primary
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| fallback.filter(|p| !p.as_os_str().is_empty()))
}
