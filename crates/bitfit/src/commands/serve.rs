//! Serve command - runs the credential-gated proxy.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use bitfit_oauth::{
    ApiClient, Authorizer, ClientCredentials, FileTokenStore, OAuth2Refresher, TokenManager,
    TokenManagerOptions, build_http_client,
};
use bitfit_server::{ProxyCredentials, ProxyServer, ServerConfig};
use clap::Args;
use tracing::info;

use super::{Context, explain};

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Serve plain HTTP instead of TLS
    #[arg(long)]
    pub plain: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let oauth = ctx.settings.oauth()?;
    let gate = ctx.settings.proxy_credentials()?;
    let listener = ctx.settings.listener(args.plain)?;
    let http = build_http_client(ctx.settings.timeout()?)?;

    let options = TokenManagerOptions::new(
        ClientCredentials::new(oauth.client_id, oauth.client_secret),
        Arc::new(FileTokenStore::new(&oauth.tokens_file)),
        Arc::new(OAuth2Refresher::new(http.clone(), ctx.api_url())),
    );
    let manager = match &oauth.initial_refresh_token {
        Some(token) => TokenManager::bootstrap(options, token).await,
        None => TokenManager::initialize(options).await,
    }
    .map_err(explain)
    .with_context(|| format!("failed to load tokens from {}", oauth.tokens_file.display()))?;

    let snapshot = manager.snapshot().await;
    info!(
        state = ?manager.state().await,
        expiration = %snapshot.expiration,
        upstream = ctx.api_url(),
        "Token manager ready"
    );

    let api = ApiClient::new(ctx.api_url(), http, Authorizer::DirectOAuth2(manager))?;

    let mut config = ServerConfig::new(ProxyCredentials::new(gate.username, gate.password))
        .with_bind_address(listener.addr);
    if let Some(tls) = listener.tls {
        config = config.with_tls(tls.cert, tls.key);
    }

    ProxyServer::new(api, config).run().await?;
    Ok(())
}
