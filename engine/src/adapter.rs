//! Adapters: populate a store from a backing system and write changes back.
//!
//! The sync executor only talks to this trait. It calls `create`, `update`
//! and `delete` for the backing write, then mutates the adapter's store
//! itself, so an adapter whose backing system is purely in-memory can rely
//! on the default methods.

use crate::{
    error::Result, Diff, Error, Fields, Identifier, Loaders, Record, Schema, Store,
    StoreSnapshot, SyncOptions, TypeName,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The parent a new record is created under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub type_name: TypeName,
    pub identity: Identifier,
}

/// Everything needed to create one record on the target side.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub type_name: TypeName,
    pub ids: Fields,
    pub attrs: Fields,
    pub parent: Option<ParentRef>,
}

impl CreateRequest {
    pub fn new(type_name: impl Into<TypeName>, ids: Fields, attrs: Fields) -> Self {
        Self {
            type_name: type_name.into(),
            ids,
            attrs,
            parent: None,
        }
    }

    pub fn with_parent(mut self, type_name: impl Into<TypeName>, identity: impl Into<Identifier>) -> Self {
        self.parent = Some(ParentRef {
            type_name: type_name.into(),
            identity: identity.into(),
        });
        self
    }
}

/// Told when an adapter finishes loading a top-level type.
pub trait LoadObserver: Send + Sync {
    fn type_loaded(&self, type_name: &str, records: usize);
}

impl LoadObserver for () {
    fn type_loaded(&self, _type_name: &str, _records: usize) {}
}

/// A source or target of a sync run.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    fn store(&self) -> &Store;

    fn store_mut(&mut self) -> &mut Store;

    /// Populate the store from the backing system, replacing its contents.
    ///
    /// Implementations check `cancel` at the start of every top-level type.
    async fn load(&mut self, cancel: &CancellationToken) -> Result<()>;

    /// [`load`](Adapter::load), reporting each finished top-level type to
    /// `observer`. Adapters that load type by type should override this and
    /// have `load` call it with `&()`.
    async fn load_observed(
        &mut self,
        cancel: &CancellationToken,
        _observer: &dyn LoadObserver,
    ) -> Result<()> {
        self.load(cancel).await
    }

    /// Perform the backing write for a new record and return it.
    ///
    /// The returned record is added to the store by the caller.
    async fn create(&mut self, request: &CreateRequest) -> Result<Record> {
        let model = self.store().schema().model(&request.type_name)?;
        Record::new(model, request.ids.clone(), request.attrs.clone())
    }

    /// Propagate changed attributes of `record` to the backing system.
    async fn update(&mut self, _record: &Record, _attrs: &Fields) -> Result<()> {
        Ok(())
    }

    /// Remove `record` from the backing system.
    async fn delete(&mut self, _record: &Record) -> Result<()> {
        Ok(())
    }

    /// Called once after every diff action has been applied. Must be
    /// idempotent.
    async fn sync_complete(&mut self, _diff: &Diff, _options: &SyncOptions) -> Result<()> {
        Ok(())
    }
}

/// An adapter whose backing system is a snapshot held in memory.
///
/// Writes only touch local state. Used for diff-only inspection, for tests,
/// and by the CLI to sync between snapshot files.
#[derive(Debug)]
pub struct MemoryAdapter {
    name: String,
    store: Store,
    seed: StoreSnapshot,
    loaders: Loaders,
}

impl MemoryAdapter {
    pub fn new(name: impl Into<String>, schema: Arc<Schema>) -> Self {
        let name = name.into();
        Self {
            seed: StoreSnapshot::new(name.clone()),
            name,
            store: Store::new(schema),
            loaders: Loaders::new(),
        }
    }

    /// Builder-style method to set the snapshot `load()` reads from.
    pub fn with_snapshot(mut self, snapshot: StoreSnapshot) -> Self {
        self.seed = snapshot;
        self
    }

    pub fn with_loaders(mut self, loaders: Loaders) -> Self {
        self.loaders = loaders;
        self
    }

    /// Capture the current store contents.
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        StoreSnapshot::capture(&self.store, self.name.clone())
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn store(&self) -> &Store {
        &self.store
    }

    fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    async fn load(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.load_observed(cancel, &()).await
    }

    async fn load_observed(
        &mut self,
        cancel: &CancellationToken,
        observer: &dyn LoadObserver,
    ) -> Result<()> {
        self.store.clear();
        self.seed.validate(self.store.schema())?;

        let top_level = self.store.schema().top_level().to_vec();
        for type_name in &top_level {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let loaded = self
                .seed
                .load_type_into(type_name, &mut self.store, &self.loaders)?;
            observer.type_loaded(type_name, loaded);
        }

        info!(
            adapter = %self.name,
            records = self.store.count(None),
            "loaded snapshot"
        );
        Ok(())
    }
}
