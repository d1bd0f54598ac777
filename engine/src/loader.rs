//! Field loaders: turning a backing system's native representation into records.
//!
//! By default every declared field is copied straight out of the native
//! object, following dotted relationship paths (`location__name` reads
//! `native["location"]["name"]`). A [`FieldLoader`] may override the
//! extraction of individual fields, e.g. to render a timezone object as a
//! string, without touching the matching or diff logic.

use crate::{error::Result, Error, FieldDef, FieldName, Fields, ModelSchema, Record, TypeName};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A backing system's native record: field name to JSON value, with related
/// entities nested as objects.
pub type NativeFields = Map<String, Value>;

/// Custom extraction for one field.
pub type FieldFn = Arc<dyn Fn(&NativeFields) -> Result<Value> + Send + Sync>;

/// Separator between segments of a relationship path.
pub const PATH_SEPARATOR: &str = "__";

static NULL: Value = Value::Null;

/// Split `location__name` into `("location", "name")`.
pub fn split_path(name: &str) -> Option<(&str, &str)> {
    name.split_once(PATH_SEPARATOR)
}

/// Resolve a possibly dotted field name against a native record.
///
/// A flat key matching the full name wins. A `null` relation along the path
/// yields `null`; a missing key yields `None`.
pub fn lookup_path<'a>(native: &'a NativeFields, name: &str) -> Option<&'a Value> {
    if let Some(value) = native.get(name) {
        return Some(value);
    }

    let (head, rest) = split_path(name)?;
    match native.get(head)? {
        Value::Null => Some(&NULL),
        Value::Object(related) => lookup_path(related, rest),
        _ => None,
    }
}

/// Per-type field extraction with optional per-field overrides.
#[derive(Clone, Default)]
pub struct FieldLoader {
    overrides: HashMap<FieldName, FieldFn>,
}

impl fmt::Debug for FieldLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<_> = self.overrides.keys().collect();
        fields.sort();
        f.debug_struct("FieldLoader")
            .field("overrides", &fields)
            .finish()
    }
}

impl FieldLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style method to override how `field` is extracted.
    pub fn with_override<F>(mut self, field: impl Into<FieldName>, loader: F) -> Self
    where
        F: Fn(&NativeFields) -> Result<Value> + Send + Sync + 'static,
    {
        self.overrides.insert(field.into(), Arc::new(loader));
        self
    }

    pub fn has_override(&self, field: &str) -> bool {
        self.overrides.contains_key(field)
    }

    /// Extract one declared field from a native record.
    pub fn load_value(&self, model: &ModelSchema, def: &FieldDef, native: &NativeFields) -> Result<Value> {
        if let Some(loader) = self.overrides.get(&def.name) {
            return loader(native);
        }

        lookup_path(native, &def.name)
            .cloned()
            .ok_or_else(|| Error::SchemaMismatch {
                type_name: model.type_name.clone(),
                field: def.name.clone(),
            })
    }

    /// Build a record of `model`'s type from a native record.
    pub fn load(&self, model: &ModelSchema, native: &NativeFields) -> Result<Record> {
        let mut ids = Fields::with_capacity(model.identifiers.len());
        for def in &model.identifiers {
            ids.insert(def.name.clone(), self.load_value(model, def, native)?);
        }

        let mut attrs = Fields::with_capacity(model.attributes.len());
        for def in &model.attributes {
            attrs.insert(def.name.clone(), self.load_value(model, def, native)?);
        }

        Record::new(model, ids, attrs)
    }
}

/// Field loaders keyed by type name. Types without an entry use direct copy.
#[derive(Debug, Clone, Default)]
pub struct Loaders {
    by_type: HashMap<TypeName, FieldLoader>,
}

impl Loaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the loader used for `type_name`.
    pub fn insert(&mut self, type_name: impl Into<TypeName>, loader: FieldLoader) -> &mut Self {
        self.by_type.insert(type_name.into(), loader);
        self
    }

    pub fn with(mut self, type_name: impl Into<TypeName>, loader: FieldLoader) -> Self {
        self.insert(type_name, loader);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&FieldLoader> {
        self.by_type.get(type_name)
    }

    /// Build a record using the loader registered for its type.
    pub fn load(&self, model: &ModelSchema, native: &NativeFields) -> Result<Record> {
        match self.by_type.get(&model.type_name) {
            Some(loader) => loader.load(model, native),
            None => FieldLoader::default().load(model, native),
        }
    }
}
