//! Snapshot types for seeding and exporting a store.
//!
//! A snapshot is a nested tree: each top-level type maps to a list of native
//! entries, and each entry carries its children inline under the parent's
//! child field. Import runs through the same field loaders as any other load,
//! so a snapshot behaves exactly like a backing system's listing.

use crate::{
    error::Result, loader::NativeFields, Error, Loaders, Record, Schema, Store, TypeName,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of a store's contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Name of the adapter the snapshot was taken from
    #[serde(default)]
    pub adapter: String,
    /// Top-level entries by type, children nested inline
    pub records: IndexMap<TypeName, Vec<NativeFields>>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            adapter: adapter.into(),
            records: IndexMap::new(),
        }
    }

    /// Capture the contents of a store.
    pub fn capture(store: &Store, adapter: impl Into<String>) -> Result<Self> {
        let mut snapshot = Self::new(adapter);
        for type_name in store.schema().top_level() {
            let mut entries = Vec::new();
            for record in store.get_all(type_name) {
                entries.push(entry_for(store, record)?);
            }
            snapshot.records.insert(type_name.clone(), entries);
        }
        Ok(snapshot)
    }

    /// Append a native entry under a top-level type.
    pub fn push(&mut self, type_name: impl Into<TypeName>, entry: NativeFields) {
        self.records.entry(type_name.into()).or_default().push(entry);
    }

    /// Load every entry of one top-level type into `store`.
    pub fn load_type_into(&self, type_name: &str, store: &mut Store, loaders: &Loaders) -> Result<usize> {
        let schema = store.schema().clone();
        let mut loaded = 0;
        for entry in self.records.get(type_name).into_iter().flatten() {
            loaded += load_entry(&schema, store, loaders, type_name, entry, None)?;
        }
        Ok(loaded)
    }

    /// Load the whole snapshot into `store`, top-level types in schema order.
    pub fn load_into(&self, store: &mut Store, loaders: &Loaders) -> Result<usize> {
        self.validate(store.schema())?;
        let top_level = store.schema().top_level().to_vec();
        let mut loaded = 0;
        for type_name in &top_level {
            loaded += self.load_type_into(type_name, store, loaders)?;
        }
        Ok(loaded)
    }

    /// Check that every type in the snapshot is a declared top-level type.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for type_name in self.records.keys() {
            if !schema.top_level().contains(type_name) {
                return Err(Error::InvalidSnapshot(format!(
                    "'{type_name}' is not a top-level type"
                )));
            }
        }
        Ok(())
    }

    /// Count entries across all levels.
    pub fn record_count(&self) -> usize {
        fn count(entry: &NativeFields) -> usize {
            1 + entry
                .values()
                .filter_map(Value::as_array)
                .flatten()
                .filter_map(Value::as_object)
                .map(count)
                .sum::<usize>()
        }
        self.records.values().flatten().map(count).sum()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

fn entry_for(store: &Store, record: &Record) -> Result<NativeFields> {
    let mut entry = NativeFields::new();
    for (name, value) in record.ids().iter().chain(record.get_attrs().iter()) {
        entry.insert(name.clone(), value.clone());
    }

    let model = store.schema().model(record.type_name())?;
    for child in &model.children {
        let mut nested = Vec::new();
        for child_record in store.children_of(record, &child.type_name)? {
            nested.push(Value::Object(entry_for(store, child_record)?));
        }
        if !nested.is_empty() {
            entry.insert(child.field.clone(), Value::Array(nested));
        }
    }
    Ok(entry)
}

fn load_entry(
    schema: &Schema,
    store: &mut Store,
    loaders: &Loaders,
    type_name: &str,
    entry: &NativeFields,
    parent: Option<(&str, &str)>,
) -> Result<usize> {
    let model = schema.model(type_name)?;
    let record = loaders.load(model, entry)?;
    let identity = record.identity().to_string();

    match parent {
        Some((parent_type, parent_identity)) => store.add_child(parent_type, parent_identity, record)?,
        None => store.add(record)?,
    }

    let mut loaded = 1;
    for child in &model.children {
        let nested = match entry.get(&child.field) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(Error::InvalidSnapshot(format!(
                    "'{}' on {} '{}' must be a list",
                    child.field, type_name, identity
                )))
            }
        };
        for item in nested {
            let child_entry = item.as_object().ok_or_else(|| {
                Error::InvalidSnapshot(format!(
                    "entries under '{}' must be objects",
                    child.field
                ))
            })?;
            loaded += load_entry(
                schema,
                store,
                loaders,
                &child.type_name,
                child_entry,
                Some((type_name, &identity)),
            )?;
        }
    }
    Ok(loaded)
}
