//! Token command - exchanges a refresh token and writes the tokens file.

use anyhow::{Context as _, Result, bail};
use bitfit_oauth::token::{self, indent_json};
use bitfit_oauth::{
    ClientCredentials, FileTokenStore, OAuth2Refresher, TokenStore, build_http_client,
};
use clap::Args;

use super::{Context, explain};

/// Arguments for the token command.
#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Print the provider's full JSON response instead of the saved record
    #[arg(long, alias = "fullresp")]
    pub full_response: bool,
}

/// Run the token command.
///
/// Uses `--refreshtoken` when given, otherwise the refresh token already in
/// the tokens file.
pub async fn run(args: TokenArgs, ctx: &Context) -> Result<()> {
    let oauth = ctx.settings.oauth()?;
    let timeout = ctx.settings.timeout()?;
    let store = FileTokenStore::new(&oauth.tokens_file);

    let refresh_token = match &oauth.initial_refresh_token {
        Some(token) => token.clone(),
        None => {
            store
                .load()
                .await
                .with_context(|| {
                    format!("no --refreshtoken given and could not read {}", store.path().display())
                })?
                .refresh
        }
    };

    let http = build_http_client(timeout)?;
    let refresher = OAuth2Refresher::new(http, ctx.api_url());
    let credentials = ClientCredentials::new(oauth.client_id, oauth.client_secret);

    let (status, body) = refresher
        .fetch_token_payload(&credentials, &refresh_token)
        .await
        .map_err(explain)?;

    // The old refresh token may be spent now, so persist before printing.
    let record = match token::decode(&body) {
        Ok(record) => record,
        Err(e) if e.requires_reauthorization() => return Err(explain(e)),
        Err(_) if !status.is_success() => {
            bail!(
                "token endpoint returned {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )
        }
        Err(e) => return Err(e).context("could not decode token response"),
    };

    store
        .save(&record)
        .await
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    tracing::info!(path = %store.path().display(), expiration = %record.expiration, "Saved new tokens");

    if args.full_response {
        println!("{}", indent_json(&body)?);
    } else {
        println!("{}", String::from_utf8_lossy(&token::encode(&record)?));
    }

    Ok(())
}
