//! Per-run flags that alter how a diff is computed and applied.
//!
//! Options are plain data supplied once at the start of a run. Per-type
//! settings layer over the global ones: `skip` and the unmatched flags are
//! OR-ed, ignored field sets are unioned.

use crate::TypeName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Diff behavior for one type (or, as [`DiffOptions::global`], for every type).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeOptions {
    /// Exclude the type, and everything beneath it, from comparison.
    pub skip: bool,
    /// Attribute names left out of the field-by-field comparison.
    pub ignore_fields: BTreeSet<String>,
    /// Records present only in the source are not created.
    pub skip_unmatched_source: bool,
    /// Records present only in the target are not deleted.
    pub skip_unmatched_target: bool,
}

impl TypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipped() -> Self {
        Self {
            skip: true,
            ..Self::default()
        }
    }

    pub fn with_ignored_field(mut self, field: impl Into<String>) -> Self {
        self.ignore_fields.insert(field.into());
        self
    }

    pub fn with_skip_unmatched_source(mut self, skip: bool) -> Self {
        self.skip_unmatched_source = skip;
        self
    }

    pub fn with_skip_unmatched_target(mut self, skip: bool) -> Self {
        self.skip_unmatched_target = skip;
        self
    }

    fn merged(&self, other: &TypeOptions) -> TypeOptions {
        TypeOptions {
            skip: self.skip || other.skip,
            ignore_fields: self
                .ignore_fields
                .union(&other.ignore_fields)
                .cloned()
                .collect(),
            skip_unmatched_source: self.skip_unmatched_source || other.skip_unmatched_source,
            skip_unmatched_target: self.skip_unmatched_target || other.skip_unmatched_target,
        }
    }
}

/// Flags consulted by the diff engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffOptions {
    /// Applies to every type.
    pub global: TypeOptions,
    /// Per-type overrides, layered over `global`.
    pub types: IndexMap<TypeName, TypeOptions>,
}

impl DiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, options: TypeOptions) -> Self {
        self.global = options;
        self
    }

    pub fn with_type(mut self, type_name: impl Into<TypeName>, options: TypeOptions) -> Self {
        self.types.insert(type_name.into(), options);
        self
    }

    /// Effective options for `type_name`.
    pub fn for_type(&self, type_name: &str) -> TypeOptions {
        match self.types.get(type_name) {
            Some(specific) => self.global.merged(specific),
            None => self.global.clone(),
        }
    }
}

/// Flags for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncOptions {
    /// Compute the diff but never touch the target.
    pub dry_run: bool,
    /// Record per-record write failures and keep going instead of aborting.
    pub continue_on_failure: bool,
    pub diff: DiffOptions,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_continue_on_failure(mut self, continue_on_failure: bool) -> Self {
        self.continue_on_failure = continue_on_failure;
        self
    }

    pub fn with_diff(mut self, diff: DiffOptions) -> Self {
        self.diff = diff;
        self
    }
}
