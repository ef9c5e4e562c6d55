//! Sleep log command - downloads one JSON file per day.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use chrono::NaiveDate;
use clap::Args;

use super::{Context, explain};

/// Arguments for the sleep-log command.
#[derive(Args, Debug)]
pub struct SleepLogArgs {
    /// First day to download (YYYY-MM-DD)
    #[arg(long)]
    pub from: NaiveDate,

    /// Last day to download, inclusive [default: --from]
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// File name prefix
    #[arg(long = "as", default_value = "sleep_log_payload")]
    pub prefix: String,

    /// Output directory
    #[arg(long, default_value = ".")]
    pub into: PathBuf,
}

/// Run the sleep-log command. Stops at the first failed day.
pub async fn run(args: SleepLogArgs, ctx: &Context) -> Result<()> {
    let to = args.to.unwrap_or(args.from);
    if to < args.from {
        bail!("--to ({}) is before --from ({})", to, args.from);
    }

    let client = ctx.api_client().await?;
    tokio::fs::create_dir_all(&args.into)
        .await
        .with_context(|| format!("failed to create {}", args.into.display()))?;

    for date in args.from.iter_days().take_while(|d| *d <= to) {
        let response = client
            .fetch_sleep_log(date)
            .await
            .map_err(explain)
            .with_context(|| format!("failed to download sleep log for {}", date))?;

        if !response.is_success() {
            bail!(
                "sleep log for {} failed with {}: {}",
                date,
                response.status,
                response.body
            );
        }

        let path = output_path(&args.into, &args.prefix, date);
        tokio::fs::write(&path, response.body.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::info!(%date, path = %path.display(), "Saved sleep log");
        if ctx.verbose {
            println!("{}", path.display());
        }
    }

    Ok(())
}

/// `<into>/<prefix>_<YYYY-MM-DD>.json`
fn output_path(into: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    into.join(format!("{}_{}.json", prefix, date.format("%Y-%m-%d")))
}
