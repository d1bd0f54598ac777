//! ssot - diff and sync two inventory snapshots through the ssot engine.
//!
//! Both commands read a schema file, a source snapshot and a target snapshot.
//! `diff` prints the Diff; `sync` applies it to the target and prints the
//! Sync Result, optionally writing the updated target snapshot.

mod commands;
mod config;
mod error;

use crate::commands::{diff::DiffArgs, sync::SyncArgs};
use crate::config::Config;
use clap::{Parser, Subcommand};
use ssot_engine::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "ssot", version, about = "Diff and sync inventory snapshots")]
struct Cli {
    /// Log at debug level unless SSOT_LOG or RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compare source against target and print the diff
    Diff(DiffArgs),
    /// Apply the diff to the target
    Sync(SyncArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let cli = Cli::parse();

    // Initialize tracing on stderr so stdout stays machine-readable
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = config.log_filter.as_deref().unwrap_or(default_level);
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match &cli.command {
        Command::Diff(args) => {
            commands::diff::run(args, &cancel).await?;
        }
        Command::Sync(args) => {
            let report = commands::sync::run(args, &config, cancel).await?;
            tracing::info!(
                run_id = %report.id,
                failed = report.applied.failed,
                "sync finished"
            );
        }
    }

    Ok(())
}
