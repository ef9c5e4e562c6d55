//! CLI command handlers.

pub mod profile;
pub mod serve;
pub mod sleep_log;
pub mod token;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use bitfit_config::Settings;
use bitfit_oauth::{ApiClient, ClientCredentials, Connection, DEFAULT_API_URL, OAuthError};
use clap::Args;

/// Settings accepted by every command as flags or `BIT_FIT_*` variables.
///
/// Anything left unset here is filled from the `--config` file.
#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// OAuth2 client id
    #[arg(long, global = true, env = "BIT_FIT_ID")]
    pub id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, global = true, env = "BIT_FIT_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Refresh token used when the tokens file does not exist yet
    #[arg(
        long,
        global = true,
        env = "BIT_FIT_REFRESHTOKEN",
        hide_env_values = true,
        alias = "refresh-token"
    )]
    pub refreshtoken: Option<String>,

    /// Persisted token file [default: tokens.json]
    #[arg(long, global = true, env = "BIT_FIT_TOKENSFILE", alias = "tokens-file")]
    pub tokensfile: Option<PathBuf>,

    /// Base URL of a bitfit proxy; switches profile and sleep-log to Basic Auth
    #[arg(long, global = true, env = "BIT_FIT_URL")]
    pub url: Option<String>,

    /// Basic Auth username (required of proxy callers, or sent to --url)
    #[arg(long, global = true, env = "BIT_FIT_USERNAME")]
    pub username: Option<String>,

    /// Basic Auth password
    #[arg(long, global = true, env = "BIT_FIT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// TLS certificate chain for serve [default: cert.txt]
    #[arg(long, global = true, env = "BIT_FIT_CERTFILE")]
    pub certfile: Option<PathBuf>,

    /// TLS private key for serve [default: key.txt]
    #[arg(long, global = true, env = "BIT_FIT_KEYFILE")]
    pub keyfile: Option<PathBuf>,

    /// Listen address for serve [default: :9090]
    #[arg(long, global = true, env = "BIT_FIT_PORT")]
    pub port: Option<String>,

    /// Outbound request timeout in seconds [default: 30]
    #[arg(long, global = true, env = "BIT_FIT_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Provider API base URL
    #[arg(long, global = true, env = "BIT_FIT_APIURL", hide = true)]
    pub apiurl: Option<String>,
}

impl SettingsArgs {
    pub fn into_settings(self) -> Settings {
        Settings {
            id: self.id,
            secret: self.secret,
            refreshtoken: self.refreshtoken,
            tokensfile: self.tokensfile,
            url: self.url,
            username: self.username,
            password: self.password,
            certfile: self.certfile,
            keyfile: self.keyfile,
            port: self.port,
            timeout: self.timeout,
            apiurl: self.apiurl,
        }
    }
}

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Flags, environment and config file, merged.
    pub settings: Settings,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Provider base URL.
    pub fn api_url(&self) -> &str {
        self.settings.apiurl.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Build a client for resource fetches: through the proxy when `--url` is
    /// set, otherwise straight to the provider with a tokens file.
    pub async fn api_client(&self) -> Result<ApiClient> {
        let timeout = self.settings.timeout()?;

        if self.settings.uses_proxy() {
            let proxy = self.settings.proxy_client()?;
            let connection = Connection::Proxy {
                username: proxy.credentials.username,
                password: proxy.credentials.password,
            };
            return ApiClient::connect(&proxy.url, connection, timeout)
                .await
                .map_err(explain)
                .with_context(|| format!("failed to set up client for proxy {}", proxy.url));
        }

        let oauth = self.settings.oauth()?;
        let tokens_file = oauth.tokens_file.clone();
        let connection = Connection::Direct {
            credentials: ClientCredentials::new(oauth.client_id, oauth.client_secret),
            tokens_file: oauth.tokens_file,
            initial_refresh_token: oauth.initial_refresh_token,
        };
        ApiClient::connect(self.api_url(), connection, timeout)
            .await
            .map_err(explain)
            .with_context(|| format!("failed to load tokens from {}", tokens_file.display()))
    }
}

/// Turn an [`OAuthError`] into a report, calling out errors that need a
/// person to re-authorize the app.
pub fn explain(e: OAuthError) -> anyhow::Error {
    if e.requires_reauthorization() {
        tracing::error!(error = %e, "Refresh token rejected by the provider");
        anyhow::Error::new(e).context(
            "re-authorization required: the provider rejected the refresh token; \
             authorize the app again and run `bitfit token --refreshtoken <token>`",
        )
    } else {
        anyhow::Error::new(e)
    }
}
