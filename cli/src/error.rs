//! Unified error handling for the CLI.

use crate::config::ConfigError;
use std::path::PathBuf;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(ssot_engine::Error),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Sync failed: {0}")]
    SyncFailed(String),

    #[error("Interrupted")]
    Cancelled,
}

impl CliError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

impl From<ssot_engine::Error> for CliError {
    fn from(err: ssot_engine::Error) -> Self {
        match err {
            ssot_engine::Error::Cancelled => CliError::Cancelled,
            other => CliError::Engine(other),
        }
    }
}

/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, CliError>;
