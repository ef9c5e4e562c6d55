//! Profile command - prints the user's profile document.

use anyhow::{Result, bail};
use clap::Args;

use super::{Context, explain};

/// Arguments for the profile command.
#[derive(Args, Debug)]
pub struct ProfileArgs {}

/// Run the profile command.
pub async fn run(_args: ProfileArgs, ctx: &Context) -> Result<()> {
    let client = ctx.api_client().await?;
    let response = client.fetch_profile().await.map_err(explain)?;

    println!("{}", response.body);
    if !response.is_success() {
        bail!("profile request failed with {}", response.status);
    }
    Ok(())
}
