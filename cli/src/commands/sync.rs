//! `ssot sync`: run a full sync into the target snapshot.

use super::{write_output, Inputs};
use crate::config::Config;
use crate::error::{CliError, Result};
use clap::Args;
use ssot_engine::{CancellationToken, SyncReport, Synchronizer};
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub inputs: Inputs,

    /// Compute and report changes without writing to the target
    #[arg(long)]
    pub dry_run: bool,

    /// Keep applying after a per-record failure
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Write the updated target snapshot here
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write the sync result here instead of stdout
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub async fn run(args: &SyncArgs, config: &Config, cancel: CancellationToken) -> Result<SyncReport> {
    let loaded = args.inputs.open()?;
    let (mut source, mut target) = (loaded.source, loaded.target);

    // Flags and environment can only switch these on.
    let mut options = loaded.options;
    options.dry_run |= args.dry_run || config.dry_run;
    options.continue_on_failure |= args.continue_on_failure || config.continue_on_failure;

    let report = Synchronizer::new(options)
        .with_cancellation(cancel)
        .run(&mut source, &mut target)
        .await;

    write_output(args.report.as_deref(), &report.to_json_pretty()?)?;

    if report.is_cancelled() {
        return Err(CliError::Cancelled);
    }
    if let Some(error) = &report.error {
        return Err(CliError::SyncFailed(error.clone()));
    }

    for failure in report.failures() {
        tracing::warn!(
            type_name = %failure.type_name,
            identifier = %failure.identifier,
            message = failure.message.as_deref().unwrap_or(""),
            "record failed"
        );
    }

    if let Some(path) = &args.output {
        if !report.dry_run {
            let snapshot = target.snapshot()?;
            write_output(Some(path), &snapshot.to_json_pretty()?)?;
            tracing::info!(path = %path.display(), records = snapshot.record_count(), "target snapshot written");
        }
    }

    Ok(report)
}
