//! `ssot diff`: load both snapshots and print the Diff.

use super::{write_output, Inputs};
use crate::error::Result;
use clap::Args;
use ssot_engine::{diff_stores, Adapter, CancellationToken, Diff};
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub inputs: Inputs,

    /// Write the diff here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn run(args: &DiffArgs, cancel: &CancellationToken) -> Result<Diff> {
    let mut loaded = args.inputs.open()?;

    loaded.source.load(cancel).await?;
    loaded.target.load(cancel).await?;

    let diff = diff_stores(loaded.source.store(), loaded.target.store(), &loaded.options.diff)?;
    tracing::info!(
        source = loaded.source.name(),
        target = loaded.target.name(),
        summary = %diff.summary(),
        "diff computed"
    );

    let json = if args.pretty {
        diff.to_json_pretty()?
    } else {
        diff.to_json()?
    };
    write_output(args.output.as_deref(), &json)?;

    Ok(diff)
}
