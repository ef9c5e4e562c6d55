//! Validated views over [`Settings`], one per way the tools talk to the API.
//!
//! Each accessor checks its required fields in a fixed order and reports the
//! first one missing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::settings::Settings;

/// Tokens file used when none is configured.
pub const DEFAULT_TOKENS_FILE: &str = "tokens.json";

/// Listen address used when none is configured.
pub const DEFAULT_PORT: &str = ":9090";

pub const DEFAULT_CERT_FILE: &str = "cert.txt";
pub const DEFAULT_KEY_FILE: &str = "key.txt";

/// Outbound request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything needed to hold tokens directly against the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub tokens_file: PathBuf,
    /// Only used when `tokens_file` does not exist yet.
    pub initial_refresh_token: Option<String>,
}

impl std::fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tokens_file", &self.tokens_file)
            .field(
                "initial_refresh_token",
                &self.initial_refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// A Basic Auth username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Settings for calling the API through a credential-gated proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyClientSettings {
    pub url: String,
    pub credentials: BasicCredentials,
}

/// PEM files for the TLS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Where and how the proxy listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSettings {
    pub addr: SocketAddr,
    /// `None` serves plain HTTP.
    pub tls: Option<TlsFiles>,
}

impl Settings {
    /// Client credentials and token source for direct provider access.
    pub fn oauth(&self) -> Result<OAuthSettings> {
        const CONTEXT: &str = "OAuth2 client settings";

        let client_id = required(&self.id, "id", CONTEXT)?;
        let client_secret = required(&self.secret, "secret", CONTEXT)?;

        let initial_refresh_token = self.refreshtoken.clone().filter(|s| !s.is_empty());
        let tokens_file = self
            .tokensfile
            .clone()
            .filter(|p| !p.as_os_str().is_empty());
        if initial_refresh_token.is_none() && tokens_file.is_none() {
            return Err(ConfigError::missing("refreshtoken or tokensfile", CONTEXT));
        }

        Ok(OAuthSettings {
            client_id,
            client_secret,
            tokens_file: tokens_file.unwrap_or_else(|| PathBuf::from(DEFAULT_TOKENS_FILE)),
            initial_refresh_token,
        })
    }

    /// Credentials the proxy demands from its callers.
    pub fn proxy_credentials(&self) -> Result<BasicCredentials> {
        const CONTEXT: &str = "proxy settings";

        Ok(BasicCredentials {
            username: required(&self.username, "username", CONTEXT)?,
            password: required(&self.password, "password", CONTEXT)?,
        })
    }

    /// Proxy URL and credentials for proxy-client mode.
    pub fn proxy_client(&self) -> Result<ProxyClientSettings> {
        const CONTEXT: &str = "proxy client settings";

        let url = required(&self.url, "url", CONTEXT)?;
        Ok(ProxyClientSettings {
            url,
            credentials: BasicCredentials {
                username: required(&self.username, "username", CONTEXT)?,
                password: required(&self.password, "password", CONTEXT)?,
            },
        })
    }

    /// Whether proxy-client mode was asked for.
    pub fn uses_proxy(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Listen address and, unless `plain`, the TLS files.
    pub fn listener(&self, plain: bool) -> Result<ListenerSettings> {
        let addr = parse_listen_addr(self.port.as_deref().unwrap_or(DEFAULT_PORT))?;
        let tls = (!plain).then(|| TlsFiles {
            cert: self
                .certfile
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CERT_FILE)),
            key: self
                .keyfile
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_FILE)),
        });
        Ok(ListenerSettings { addr, tls })
    }

    /// Outbound request timeout.
    pub fn timeout(&self) -> Result<Duration> {
        match self.timeout {
            None => Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            Some(0) => Err(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            }),
            Some(secs) => Ok(Duration::from_secs(secs)),
        }
    }
}

/// An empty value counts as missing.
fn required(value: &Option<String>, field: &str, context: &str) -> Result<String> {
    value
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::missing(field, context))
}

/// Parse a listen address.
///
/// Accepts `:9090` and `9090` (all interfaces) as well as a full `ip:port`.
pub fn parse_listen_addr(port: &str) -> Result<SocketAddr> {
    let candidate = if let Some(rest) = port.strip_prefix(':') {
        format!("0.0.0.0:{}", rest)
    } else if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
        format!("0.0.0.0:{}", port)
    } else {
        port.to_string()
    };

    candidate
        .parse()
        .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
            field: "port".to_string(),
            value: port.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_settings() -> Settings {
        Settings {
            id: Some("22ABCD".to_string()),
            secret: Some("s3cret".to_string()),
            refreshtoken: Some("bar".to_string()),
            ..Default::default()
        }
    }

    fn missing_field(err: ConfigError) -> String {
        match err {
            ConfigError::MissingField { field, .. } => field,
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_oauth_defaults_tokens_file() {
        let oauth = oauth_settings().oauth().unwrap();
        assert_eq!(oauth.client_id, "22ABCD");
        assert_eq!(oauth.tokens_file, PathBuf::from("tokens.json"));
        assert_eq!(oauth.initial_refresh_token.as_deref(), Some("bar"));
    }

    #[test]
    fn test_oauth_tokens_file_without_refresh_token() {
        let settings = Settings {
            refreshtoken: None,
            tokensfile: Some(PathBuf::from("/tmp/t.json")),
            ..oauth_settings()
        };
        let oauth = settings.oauth().unwrap();
        assert_eq!(oauth.tokens_file, PathBuf::from("/tmp/t.json"));
        assert!(oauth.initial_refresh_token.is_none());
    }

    #[test]
    fn test_oauth_first_missing_field_wins() {
        assert_eq!(missing_field(Settings::default().oauth().unwrap_err()), "id");

        let no_secret = Settings {
            secret: None,
            refreshtoken: None,
            ..oauth_settings()
        };
        assert_eq!(missing_field(no_secret.oauth().unwrap_err()), "secret");

        let no_source = Settings {
            refreshtoken: None,
            ..oauth_settings()
        };
        assert_eq!(
            missing_field(no_source.oauth().unwrap_err()),
            "refreshtoken or tokensfile"
        );
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let empty = || Some(String::new());

        let settings = Settings {
            id: empty(),
            ..oauth_settings()
        };
        assert_eq!(missing_field(settings.oauth().unwrap_err()), "id");

        let settings = Settings {
            secret: empty(),
            ..oauth_settings()
        };
        assert_eq!(missing_field(settings.oauth().unwrap_err()), "secret");

        let settings = Settings {
            refreshtoken: empty(),
            ..oauth_settings()
        };
        assert_eq!(
            missing_field(settings.oauth().unwrap_err()),
            "refreshtoken or tokensfile"
        );

        let settings = Settings {
            username: empty(),
            password: Some("pw".to_string()),
            ..Default::default()
        };
        assert_eq!(
            missing_field(settings.proxy_credentials().unwrap_err()),
            "username"
        );

        let settings = Settings {
            username: Some("alice".to_string()),
            password: empty(),
            ..Default::default()
        };
        assert_eq!(
            missing_field(settings.proxy_credentials().unwrap_err()),
            "password"
        );
    }

    #[test]
    fn test_empty_refresh_token_with_tokens_file_is_not_a_grant() {
        let settings = Settings {
            refreshtoken: Some(String::new()),
            tokensfile: Some(PathBuf::from("/tmp/t.json")),
            ..oauth_settings()
        };
        assert!(settings.oauth().unwrap().initial_refresh_token.is_none());
    }

    #[test]
    fn test_empty_url_is_not_proxy_mode() {
        let settings = Settings {
            url: Some(String::new()),
            ..Default::default()
        };
        assert!(!settings.uses_proxy());
    }

    #[test]
    fn test_oauth_debug_redacts_secrets() {
        let debug = format!("{:?}", oauth_settings().oauth().unwrap());
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("\"bar\""));
    }

    #[test]
    fn test_proxy_credentials_order() {
        assert_eq!(
            missing_field(Settings::default().proxy_credentials().unwrap_err()),
            "username"
        );

        let settings = Settings {
            username: Some("alice".to_string()),
            ..Default::default()
        };
        assert_eq!(
            missing_field(settings.proxy_credentials().unwrap_err()),
            "password"
        );
    }

    #[test]
    fn test_proxy_client_requires_url_first() {
        let settings = Settings {
            username: Some("alice".to_string()),
            password: Some("pw".to_string()),
            ..Default::default()
        };
        assert!(!settings.uses_proxy());
        assert_eq!(missing_field(settings.proxy_client().unwrap_err()), "url");

        let settings = Settings {
            url: Some("https://proxy.example.com".to_string()),
            ..settings
        };
        assert!(settings.uses_proxy());
        let client = settings.proxy_client().unwrap();
        assert_eq!(client.url, "https://proxy.example.com");
        assert_eq!(client.credentials.username, "alice");
    }

    #[test]
    fn test_listener_defaults() {
        let listener = Settings::default().listener(false).unwrap();
        assert_eq!(listener.addr, "0.0.0.0:9090".parse::<SocketAddr>().unwrap());
        let tls = listener.tls.unwrap();
        assert_eq!(tls.cert, PathBuf::from("cert.txt"));
        assert_eq!(tls.key, PathBuf::from("key.txt"));
    }

    #[test]
    fn test_listener_plain_has_no_tls() {
        let settings = Settings {
            port: Some("127.0.0.1:8080".to_string()),
            ..Default::default()
        };
        let listener = settings.listener(true).unwrap();
        assert_eq!(listener.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert!(listener.tls.is_none());
    }

    #[test]
    fn test_parse_listen_addr_forms() {
        assert_eq!(parse_listen_addr(":443").unwrap().port(), 443);
        assert_eq!(parse_listen_addr("8443").unwrap().port(), 8443);
        assert!(matches!(
            parse_listen_addr("nine-thousand"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(parse_listen_addr("").is_err());
    }

    #[test]
    fn test_timeout() {
        assert_eq!(Settings::default().timeout().unwrap(), Duration::from_secs(30));

        let settings = Settings {
            timeout: Some(5),
            ..Default::default()
        };
        assert_eq!(settings.timeout().unwrap(), Duration::from_secs(5));

        let settings = Settings {
            timeout: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            settings.timeout(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
