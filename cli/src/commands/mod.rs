//! Subcommands and the file inputs they share.

pub mod diff;
pub mod sync;

use crate::error::{CliError, Result};
use clap::Args;
use serde::de::DeserializeOwned;
use ssot_engine::{MemoryAdapter, Schema, StoreSnapshot, SyncOptions};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Files every command reads.
#[derive(Debug, Clone, Args)]
pub struct Inputs {
    /// Schema file describing every record type (JSON)
    #[arg(long)]
    pub schema: PathBuf,

    /// Snapshot of the authoritative system
    #[arg(long)]
    pub source: PathBuf,

    /// Snapshot of the system to bring in line
    #[arg(long)]
    pub target: PathBuf,

    /// Sync options file (camelCase JSON)
    #[arg(long)]
    pub options: Option<PathBuf>,
}

/// Parsed inputs, ready to load.
pub struct Loaded {
    pub source: MemoryAdapter,
    pub target: MemoryAdapter,
    pub options: SyncOptions,
}

impl Inputs {
    pub fn open(&self) -> Result<Loaded> {
        let schema: Schema = read_json(&self.schema)?;
        schema.validate()?;
        let schema = Arc::new(schema);

        let options = match &self.options {
            Some(path) => read_json(path)?,
            None => SyncOptions::default(),
        };

        Ok(Loaded {
            source: adapter(&self.source, schema.clone())?,
            target: adapter(&self.target, schema)?,
            options,
        })
    }
}

/// A memory adapter seeded from a snapshot file, named after the snapshot's
/// adapter or else the file stem.
fn adapter(path: &Path, schema: Arc<Schema>) -> Result<MemoryAdapter> {
    let text = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
    let snapshot = StoreSnapshot::from_json(&text)?;
    let name = if snapshot.adapter.is_empty() {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string())
    } else {
        snapshot.adapter.clone()
    };
    Ok(MemoryAdapter::new(name, schema).with_snapshot(snapshot))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| CliError::json(path, e))
}

/// Write to `path`, or to stdout when none is given.
pub fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, contents).map_err(|e| CliError::io(path, e)),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{contents}").map_err(|e| CliError::io("<stdout>", e))
        }
    }
}
