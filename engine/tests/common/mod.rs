//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use ssot_engine::{
    Adapter, CancellationToken, CreateRequest, Diff, Error, FieldDef, FieldType, Fields,
    LoadObserver, MemoryAdapter, ModelSchema, NativeFields, NativeRecord, Record,
    RegistryClient, Result, Schema, Scope, Store, StoreSnapshot, SyncOptions,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// device (with container children) and vlan, both top-level.
pub fn inventory_schema() -> Arc<Schema> {
    let schema = Schema::new()
        .with_top_level(["device", "vlan"])
        .with_model(
            ModelSchema::new("device")
                .with_identifier(FieldDef::required("name", FieldType::String))
                .with_attribute(FieldDef::optional("role", FieldType::String))
                .with_child("container", "containers"),
        )
        .with_model(
            ModelSchema::new("container")
                .with_identifier(FieldDef::required("device", FieldType::String))
                .with_identifier(FieldDef::required("slot", FieldType::Int))
                .with_attribute(FieldDef::optional("model", FieldType::String)),
        )
        .with_model(
            ModelSchema::new("vlan")
                .with_identifier(FieldDef::required("vid", FieldType::Int))
                .with_attribute(FieldDef::optional("name", FieldType::String)),
        );
    schema.validate().unwrap();
    Arc::new(schema)
}

/// Build a snapshot from `{type: [entries...]}`.
pub fn snapshot(name: &str, records: Value) -> StoreSnapshot {
    let mut snapshot = StoreSnapshot::new(name);
    for (type_name, entries) in records.as_object().cloned().unwrap_or_default() {
        for entry in entries.as_array().cloned().unwrap_or_default() {
            snapshot.push(type_name.clone(), entry.as_object().cloned().unwrap());
        }
    }
    snapshot
}

pub fn memory(name: &str, records: Value) -> MemoryAdapter {
    MemoryAdapter::new(name, inventory_schema()).with_snapshot(snapshot(name, records))
}

pub fn vlans(entries: &[(i64, &str)]) -> Value {
    let entries: Vec<Value> = entries
        .iter()
        .map(|(vid, name)| json!({"vid": vid, "name": name}))
        .collect();
    json!({ "vlan": entries })
}

/// Memory-backed target that records every backing write and fails the
/// writes it is told to.
pub struct FlakyAdapter {
    pub inner: MemoryAdapter,
    pub fail: HashSet<(String, String)>,
    pub writes: Vec<String>,
    pub cancel_after: Option<(usize, CancellationToken)>,
    pub completed: usize,
}

impl FlakyAdapter {
    pub fn new(inner: MemoryAdapter) -> Self {
        Self {
            inner,
            fail: HashSet::new(),
            writes: Vec::new(),
            cancel_after: None,
            completed: 0,
        }
    }

    pub fn failing(mut self, type_name: &str, identity: &str) -> Self {
        self.fail.insert((type_name.to_string(), identity.to_string()));
        self
    }

    pub fn cancelling_after(mut self, writes: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((writes, token));
        self
    }

    fn write(&mut self, action: &str, type_name: &str, identity: &str) -> Result<()> {
        if self.fail.contains(&(type_name.to_string(), identity.to_string())) {
            let cause = "injected failure".to_string();
            return Err(match action {
                "create" => Error::Creation {
                    type_name: type_name.to_string(),
                    identifier: identity.to_string(),
                    cause,
                },
                _ => Error::Update {
                    type_name: type_name.to_string(),
                    identifier: identity.to_string(),
                    cause,
                },
            });
        }
        self.writes.push(format!("{action} {type_name} {identity}"));
        if let Some((limit, token)) = &self.cancel_after {
            if self.writes.len() >= *limit {
                token.cancel();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for FlakyAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn store(&self) -> &Store {
        self.inner.store()
    }

    fn store_mut(&mut self) -> &mut Store {
        self.inner.store_mut()
    }

    async fn load(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.inner.load(cancel).await
    }

    async fn load_observed(
        &mut self,
        cancel: &CancellationToken,
        observer: &dyn LoadObserver,
    ) -> Result<()> {
        self.inner.load_observed(cancel, observer).await
    }

    async fn create(&mut self, request: &CreateRequest) -> Result<Record> {
        let record = self.inner.create(request).await?;
        self.write("create", &request.type_name, record.identity())?;
        Ok(record)
    }

    async fn update(&mut self, record: &Record, attrs: &Fields) -> Result<()> {
        self.write("update", record.type_name(), record.identity())?;
        self.inner.update(record, attrs).await
    }

    async fn delete(&mut self, record: &Record) -> Result<()> {
        self.write("delete", record.type_name(), record.identity())?;
        self.inner.delete(record).await
    }

    async fn sync_complete(&mut self, _diff: &Diff, _options: &SyncOptions) -> Result<()> {
        self.completed += 1;
        Ok(())
    }
}

/// A registry kept in memory. Related entities are returned nested, the way
/// a REST API expands foreign keys.
#[derive(Default)]
pub struct MemoryRegistry {
    rows: Mutex<HashMap<String, Vec<NativeRecord>>>,
    /// Parent scope of each inserted child, by (type, reference).
    parents: Mutex<Vec<(String, Value, Scope)>>,
    next_reference: AtomicUsize,
    /// Types whose listing fails.
    pub failing_lists: HashSet<String>,
    /// Listing latency for top-level types.
    pub latency: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            next_reference: AtomicUsize::new(1),
            ..Self::default()
        }
    }

    /// Seed one entity and return its reference.
    pub fn seed(&self, type_name: &str, fields: Value) -> Value {
        let reference = json!(self.next_reference.fetch_add(1, Ordering::SeqCst));
        let fields = fields.as_object().cloned().unwrap_or_default();
        self.rows
            .lock()
            .unwrap()
            .entry(type_name.to_string())
            .or_default()
            .push(NativeRecord::new(reference.clone(), fields));
        reference
    }

    pub fn rows(&self, type_name: &str) -> Vec<NativeRecord> {
        self.rows
            .lock()
            .unwrap()
            .get(type_name)
            .cloned()
            .unwrap_or_default()
    }

    fn expand(&self, fields: &NativeFields) -> NativeFields {
        let rows = self.rows.lock().unwrap();
        fields
            .iter()
            .map(|(name, value)| {
                let related = rows.get(name).and_then(|entities| {
                    entities
                        .iter()
                        .find(|entity| &entity.reference == value)
                        .map(|entity| Value::Object(entity.fields.clone()))
                });
                (name.clone(), related.unwrap_or_else(|| value.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    fn list(&self, type_name: &str, scope: Option<Scope>) -> BoxStream<'_, Result<NativeRecord>> {
        if self.failing_lists.contains(type_name) {
            let cause = format!("listing {type_name} timed out");
            return stream::once(async move {
                Err(Error::Load {
                    adapter: "registry".to_string(),
                    cause,
                })
            })
            .boxed();
        }

        let top_level = scope.is_none();
        let parents = self.parents.lock().unwrap().clone();
        let rows: Vec<Result<NativeRecord>> = self
            .rows(type_name)
            .into_iter()
            .filter(|row| match &scope {
                Some(scope) => {
                    row.fields.get(&scope.parent_type) == Some(&scope.parent_reference)
                        || parents.iter().any(|(t, reference, parent)| {
                            t == type_name && reference == &row.reference && parent == scope
                        })
                }
                None => true,
            })
            .map(|row| Ok(NativeRecord::new(row.reference.clone(), self.expand(&row.fields))))
            .collect();

        let latency = self.latency;
        stream::once(async move {
            if top_level {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                if let Some(latency) = latency {
                    tokio::time::sleep(latency).await;
                }
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            stream::iter(rows)
        })
        .flatten()
        .boxed()
    }

    async fn resolve_related(&self, relation: &str, lookup: &NativeFields) -> Result<Option<Value>> {
        Ok(self
            .rows(relation)
            .into_iter()
            .find(|row| lookup.iter().all(|(k, v)| row.fields.get(k) == Some(v)))
            .map(|row| row.reference))
    }

    async fn insert(&self, type_name: &str, fields: NativeFields, parent: Option<Scope>) -> Result<Value> {
        let reference = self.seed(type_name, Value::Object(fields));
        if let Some(parent) = parent {
            self.parents
                .lock()
                .unwrap()
                .push((type_name.to_string(), reference.clone(), parent));
        }
        Ok(reference)
    }

    async fn update(&self, type_name: &str, reference: &Value, fields: NativeFields) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(type_name)
            .and_then(|entities| entities.iter_mut().find(|e| &e.reference == reference))
            .ok_or_else(|| Error::ObjectNotFound {
                type_name: type_name.to_string(),
                identifier: reference.to_string(),
            })?;
        row.fields.extend(fields);
        Ok(())
    }

    async fn delete(&self, type_name: &str, reference: &Value) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let entities = rows.entry(type_name.to_string()).or_default();
        let before = entities.len();
        entities.retain(|e| &e.reference != reference);
        if entities.len() == before {
            return Err(Error::ObjectNotFound {
                type_name: type_name.to_string(),
                identifier: reference.to_string(),
            });
        }
        Ok(())
    }
}
