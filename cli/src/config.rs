//! Configuration management for the CLI.

use std::env;

/// Process configuration loaded from environment variables.
///
/// Command-line flags take precedence over anything set here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Tracing filter directive (`SSOT_LOG`, then `RUST_LOG`)
    pub log_filter: Option<String>,
    /// Compute and report changes without writing to the target
    pub dry_run: bool,
    /// Keep applying after a per-record failure
    pub continue_on_failure: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_filter = lookup("SSOT_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|filter| !filter.trim().is_empty());

        let dry_run = flag(&lookup, "SSOT_DRY_RUN")?;
        let continue_on_failure = flag(&lookup, "SSOT_CONTINUE_ON_FAILURE")?;

        Ok(Self {
            log_filter,
            dry_run,
            continue_on_failure,
        })
    }
}

fn flag<F>(lookup: &F, key: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag {
                key,
                value: value.to_string(),
            }),
        },
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {key} value '{value}', expected true or false")]
    InvalidFlag { key: &'static str, value: String },
}
