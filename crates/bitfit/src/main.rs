//! bitfit - Fitbit Web API tools
//!
//! Main entry point for the bitfit CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{SettingsArgs, profile, serve, sleep_log, token};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// bitfit - Fitbit Web API tools
#[derive(Parser)]
#[command(name = "bitfit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON config file whose keys match the flag names
    #[arg(long, global = true, env = "BIT_FIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Exchange a refresh token and write the tokens file
    Token(token::TokenArgs),

    /// Print the user's profile
    Profile(profile::ProfileArgs),

    /// Download sleep logs for a range of dates
    SleepLog(sleep_log::SleepLogArgs),

    /// Run the credential-gated proxy
    Serve(serve::ServeArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "bitfit=debug,bitfit_oauth=debug,bitfit_server=debug,bitfit_config=debug,tower_http=debug,info"
    } else {
        "bitfit=info,bitfit_oauth=info,bitfit_server=info,warn"
    };

    let log_dir = bitfit_config::log_dir().unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "bitfit.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "bitfit=trace,bitfit_oauth=trace,bitfit_server=trace,bitfit_config=trace,tower_http=debug,info",
                )),
        )
        .init();

    let settings = cli.settings.into_settings().with_file(cli.config.as_deref())?;

    let ctx = commands::Context {
        settings,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Token(args) => token::run(args, &ctx).await,
        Commands::Profile(args) => profile::run(args, &ctx).await,
        Commands::SleepLog(args) => sleep_log::run(args, &ctx).await,
        Commands::Serve(args) => serve::run(args, &ctx).await,
    }
}
