//! # SSoT Engine
//!
//! A generic model diff-and-sync engine for single-source-of-truth integrations.
//!
//! Two systems of record are loaded into independent stores of typed,
//! identified records. The engine computes the create/update/delete
//! operations that turn the target into the source and applies them through
//! the target's adapter, with defined ordering and partial-failure semantics.
//!
//! ## Design Principles
//!
//! - **No IO of its own**: backing systems are reached only through [`Adapter`]
//!   and [`RegistryClient`]
//! - **Deterministic**: the same two stores always produce the same [`Diff`]
//! - **Explicit schema**: every type is described by a [`ModelSchema`],
//!   validated once before a run
//!
//! ## Core Concepts
//!
//! ### Records and stores
//!
//! A [`Record`] carries identifier fields, attribute fields and the identities
//! of its children. Its composite key joins the identifier values in
//! declared order. A [`Store`] indexes records by type, then by key.
//!
//! ### Diffing
//!
//! [`diff_stores`] walks the top-level types in schema order and recurses
//! into children, classifying each identity as create, update, delete or
//! no-change. [`DiffOptions`] can skip types, ignore fields, or leave records
//! present on one side only alone.
//!
//! ### Syncing
//!
//! A [`Synchronizer`] loads both adapters, diffs them and applies the diff,
//! producing a [`SyncReport`] with per-phase timing and memory, action counts
//! and a per-record log.
//!
//! ## Quick Start
//!
//! ```rust
//! use ssot_engine::{
//!     diff_stores, DiffAction, DiffOptions, FieldDef, FieldType, Fields, ModelSchema,
//!     Record, Schema, Store,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! // 1. Describe the types
//! let schema = Arc::new(
//!     Schema::new().with_top_level(["vlan"]).with_model(
//!         ModelSchema::new("vlan")
//!             .with_identifier(FieldDef::required("vid", FieldType::Int))
//!             .with_attribute(FieldDef::optional("name", FieldType::String)),
//!     ),
//! );
//! schema.validate().unwrap();
//!
//! // 2. Fill a source store; leave the target empty
//! let mut source = Store::new(schema.clone());
//! let target = Store::new(schema.clone());
//! let ids: Fields = [("vid".to_string(), json!(10))].into_iter().collect();
//! let attrs: Fields = [("name".to_string(), json!("A"))].into_iter().collect();
//! source.add(Record::new(schema.model("vlan").unwrap(), ids, attrs).unwrap()).unwrap();
//!
//! // 3. Diff
//! let diff = diff_stores(&source, &target, &DiffOptions::new()).unwrap();
//! assert_eq!(diff.find("vlan", "10").unwrap().action, DiffAction::Create);
//! ```

pub mod adapter;
pub mod diff;
pub mod error;
pub mod loader;
pub mod options;
pub mod record;
pub mod registry;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod telemetry;

// Re-export main types at crate root
pub use adapter::{Adapter, CreateRequest, LoadObserver, MemoryAdapter, ParentRef};
pub use diff::{diff_stores, AttrChange, Diff, DiffAction, DiffElement, DiffSummary, Differ};
pub use error::{Error, Result};
pub use loader::{FieldLoader, Loaders, NativeFields};
pub use options::{DiffOptions, SyncOptions, TypeOptions};
pub use record::{compose_identity, Fields, Record, RecordStatus, Status};
pub use registry::{NativeRecord, RegistryAdapter, RegistryClient, Scope};
pub use schema::{ChildSpec, FieldDef, FieldType, ModelSchema, Schema};
pub use snapshot::{StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{Collection, Store};
pub use sync::{
    ActionCounts, ApplyOutcome, FailureReason, Phase, PhaseTimings, RunState, SyncLogEntry,
    SyncReport, Synchronizer,
};
pub use telemetry::{MemoryProbe, NoMemory, PhaseStats, ProcessMemory};
pub use tokio_util::sync::CancellationToken;

/// Type aliases for clarity
pub type TypeName = String;
pub type Identifier = String;
pub type FieldName = String;
