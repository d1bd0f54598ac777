//! Error types for the sync engine.

use crate::{FieldName, Identifier, TypeName};
use thiserror::Error;

/// All possible errors from the sync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Schema errors
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("unknown record type: {0}")]
    UnknownType(TypeName),

    #[error("schema mismatch on '{type_name}': field '{field}' is not present")]
    SchemaMismatch { type_name: TypeName, field: FieldName },

    // Value errors
    #[error("missing required field: {0}")]
    MissingRequiredField(FieldName),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: FieldName,
        expected: String,
        got: String,
    },

    #[error("identifier field '{field}' must be a scalar or a tuple of scalars")]
    InvalidIdentifier { field: FieldName },

    // Store errors
    #[error("{type_name} '{identifier}' already exists")]
    ObjectAlreadyExists {
        type_name: TypeName,
        identifier: Identifier,
    },

    #[error("{type_name} '{identifier}' not found")]
    ObjectNotFound {
        type_name: TypeName,
        identifier: Identifier,
    },

    // Backing-system write errors
    #[error("failed to create {type_name} '{identifier}': {cause}")]
    Creation {
        type_name: TypeName,
        identifier: Identifier,
        cause: String,
    },

    #[error("failed to update {type_name} '{identifier}': {cause}")]
    Update {
        type_name: TypeName,
        identifier: Identifier,
        cause: String,
    },

    #[error("stale {type_name} '{identifier}': {cause}")]
    StaleRecord {
        type_name: TypeName,
        identifier: Identifier,
        cause: String,
    },

    // Run errors
    #[error("adapter '{adapter}' failed to load: {cause}")]
    Load { adapter: String, cause: String },

    #[error("sync run cancelled")]
    Cancelled,

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl Error {
    /// Whether this error belongs to a single record's backing write and can be
    /// recorded against that record instead of aborting the run.
    pub fn is_record_failure(&self) -> bool {
        matches!(
            self,
            Error::Creation { .. }
                | Error::Update { .. }
                | Error::StaleRecord { .. }
                | Error::ObjectNotFound { .. }
        )
    }

    /// The (type, identifier) this error is attributed to, if any.
    pub fn subject(&self) -> Option<(&str, &str)> {
        match self {
            Error::ObjectAlreadyExists {
                type_name,
                identifier,
            }
            | Error::ObjectNotFound {
                type_name,
                identifier,
            }
            | Error::Creation {
                type_name,
                identifier,
                ..
            }
            | Error::Update {
                type_name,
                identifier,
                ..
            }
            | Error::StaleRecord {
                type_name,
                identifier,
                ..
            } => Some((type_name, identifier)),
            _ => None,
        }
    }

    pub(crate) fn not_found(type_name: &str, identifier: &str) -> Self {
        Error::ObjectNotFound {
            type_name: type_name.to_string(),
            identifier: identifier.to_string(),
        }
    }

    pub(crate) fn stale(type_name: &str, identifier: &str, cause: impl Into<String>) -> Self {
        Error::StaleRecord {
            type_name: type_name.to_string(),
            identifier: identifier.to_string(),
            cause: cause.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
