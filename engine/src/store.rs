//! Store - the in-memory record index for one adapter.
//!
//! Records are indexed by type name and then by composite identity, keeping
//! insertion order per type. A store is created fresh for every run, filled
//! once by `load()`, read during diffing and mutated during apply on the
//! target side only.

use crate::{error::Result, Error, Identifier, Record, Schema, TypeName};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// All records of one type, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    records: IndexMap<Identifier, Record>,
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self {
            records: IndexMap::new(),
        }
    }

    /// Get a record by identity.
    pub fn get(&self, identity: &str) -> Option<&Record> {
        self.records.get(identity)
    }

    /// Get a mutable record by identity.
    pub fn get_mut(&mut self, identity: &str) -> Option<&mut Record> {
        self.records.get_mut(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.records.contains_key(identity)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identifier> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The per-adapter store holding every loaded record.
#[derive(Debug, Clone)]
pub struct Store {
    schema: Arc<Schema>,
    collections: IndexMap<TypeName, Collection>,
    /// Child (type, identity) to the parent listing it
    parents: HashMap<(TypeName, Identifier), (TypeName, Identifier)>,
}

impl Store {
    /// Create an empty store for the given schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        // One collection per declared model, in declaration order
        let collections = schema
            .models()
            .map(|model| (model.type_name.clone(), Collection::new()))
            .collect();

        Self {
            schema,
            collections,
            parents: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Insert a record. Fails if its (type, identity) pair is already present.
    pub fn add(&mut self, record: Record) -> Result<()> {
        let collection = self
            .collections
            .get_mut(record.type_name())
            .ok_or_else(|| Error::UnknownType(record.type_name().to_string()))?;

        if collection.contains(record.identity()) {
            return Err(Error::ObjectAlreadyExists {
                type_name: record.type_name().to_string(),
                identifier: record.identity().to_string(),
            });
        }

        collection
            .records
            .insert(record.identity().to_string(), record);
        Ok(())
    }

    /// Insert a record and list it under its parent's child field.
    pub fn add_child(&mut self, parent_type: &str, parent_identity: &str, child: Record) -> Result<()> {
        let field = self
            .schema
            .model(parent_type)?
            .child_field(child.type_name())
            .ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "'{}' has no child type '{}'",
                    parent_type,
                    child.type_name()
                ))
            })?
            .to_string();

        if !self.contains(parent_type, parent_identity) {
            return Err(Error::not_found(parent_type, parent_identity));
        }

        let child_key = (child.type_name().to_string(), child.identity().to_string());
        self.add(child)?;
        self.get_mut(parent_type, parent_identity)?
            .add_child(&field, child_key.1.clone());
        self.parents
            .insert(child_key, (parent_type.to_string(), parent_identity.to_string()));
        Ok(())
    }

    /// Get a record by type and identity.
    pub fn get(&self, type_name: &str, identity: &str) -> Result<&Record> {
        self.try_get(type_name, identity)
            .ok_or_else(|| Error::not_found(type_name, identity))
    }

    /// Get a mutable record by type and identity.
    pub fn get_mut(&mut self, type_name: &str, identity: &str) -> Result<&mut Record> {
        self.collections
            .get_mut(type_name)
            .and_then(|c| c.get_mut(identity))
            .ok_or_else(|| Error::not_found(type_name, identity))
    }

    pub fn try_get(&self, type_name: &str, identity: &str) -> Option<&Record> {
        self.collections.get(type_name).and_then(|c| c.get(identity))
    }

    pub fn contains(&self, type_name: &str, identity: &str) -> bool {
        self.try_get(type_name, identity).is_some()
    }

    /// All records of a type in insertion order; empty if the type is unused.
    pub fn get_all(&self, type_name: &str) -> Vec<&Record> {
        self.collections
            .get(type_name)
            .map(|c| c.records().collect())
            .unwrap_or_default()
    }

    /// Count records of one type, or of every type when `type_name` is `None`.
    pub fn count(&self, type_name: Option<&str>) -> usize {
        match type_name {
            Some(name) => self.collections.get(name).map(Collection::len).unwrap_or(0),
            None => self.collections.values().map(Collection::len).sum(),
        }
    }

    /// Get a collection by type name.
    pub fn collection(&self, type_name: &str) -> Option<&Collection> {
        self.collections.get(type_name)
    }

    /// Children of `parent` of the given type, in the order they were attached.
    pub fn children_of(&self, parent: &Record, child_type: &str) -> Result<Vec<&Record>> {
        let model = self.schema.model(parent.type_name())?;
        let Some(field) = model.child_field(child_type) else {
            return Ok(Vec::new());
        };

        parent
            .children(field)
            .iter()
            .map(|identity| self.get(child_type, identity))
            .collect()
    }

    /// Remove a record and detach it from any parent listing it.
    pub fn remove(&mut self, type_name: &str, identity: &str) -> Result<Record> {
        let removed = self
            .collections
            .get_mut(type_name)
            .and_then(|c| c.records.shift_remove(identity))
            .ok_or_else(|| Error::not_found(type_name, identity))?;

        let Some((parent_type, parent_identity)) = self
            .parents
            .remove(&(type_name.to_string(), identity.to_string()))
        else {
            return Ok(removed);
        };
        let field = self
            .schema
            .model(&parent_type)?
            .child_field(type_name)
            .map(str::to_string);
        if let (Some(field), Ok(parent)) = (field, self.get_mut(&parent_type, &parent_identity)) {
            parent.remove_child(&field, identity);
        }

        Ok(removed)
    }

    /// Drop every record, keeping the schema.
    pub fn clear(&mut self) {
        for collection in self.collections.values_mut() {
            collection.records.clear();
        }
        self.parents.clear();
    }
}
