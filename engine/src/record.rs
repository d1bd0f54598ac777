//! Record types: the typed, identified unit of data being compared.
//!
//! A record never holds a reference back to the store that owns it. Anything
//! that needs sibling lookups receives the [`Store`](crate::Store) explicitly.

use crate::{error::Result, Error, FieldName, Identifier, ModelSchema, TypeName};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered field name to value mapping.
pub type Fields = IndexMap<FieldName, Value>;

/// Separator placed between identifier values in a composite key.
pub const KEY_SEPARATOR: &str = "__";

/// Outcome of the last create/update/delete attempt on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// Transient status attached to a record after an apply attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStatus {
    pub status: Status,
    pub message: String,
}

/// A record in a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    type_name: TypeName,
    identity: Identifier,
    ids: Fields,
    attrs: Fields,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    children: IndexMap<FieldName, Vec<Identifier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<RecordStatus>,
    #[serde(default)]
    deleted: bool,
}

impl Record {
    /// Build a record of `model`'s type.
    ///
    /// Every identifier must be present; values are coerced to their declared
    /// types. Attributes may be partial here: a declared attribute missing at
    /// diff time is reported as [`Error::SchemaMismatch`].
    pub fn new(model: &ModelSchema, ids: Fields, attrs: Fields) -> Result<Self> {
        if let Some(unknown) = ids.keys().find(|k| !model.identifier_names().any(|n| n == k.as_str())) {
            return Err(unknown_field(model, unknown));
        }
        if let Some(unknown) = attrs.keys().find(|k| model.attribute(k).is_none()) {
            return Err(unknown_field(model, unknown));
        }

        let mut ids = ids;
        let mut ordered_ids = Fields::with_capacity(model.identifiers.len());
        for def in &model.identifiers {
            let value = ids
                .shift_remove(&def.name)
                .ok_or_else(|| Error::SchemaMismatch {
                    type_name: model.type_name.clone(),
                    field: def.name.clone(),
                })?;
            ordered_ids.insert(def.name.clone(), def.normalize(value)?);
        }

        let mut attrs = attrs;
        let mut ordered_attrs = Fields::with_capacity(attrs.len());
        for def in &model.attributes {
            if let Some(value) = attrs.shift_remove(&def.name) {
                ordered_attrs.insert(def.name.clone(), def.normalize(value)?);
            }
        }

        let identity = compose_identity(&ordered_ids)?;

        Ok(Self {
            type_name: model.type_name.clone(),
            identity,
            ids: ordered_ids,
            attrs: ordered_attrs,
            children: IndexMap::new(),
            status: None,
            deleted: false,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Composite key: identifier values in declared order joined by `__`.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn ids(&self) -> &Fields {
        &self.ids
    }

    /// Current values of all attribute fields (identifiers excluded).
    pub fn get_attrs(&self) -> &Fields {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Look up an identifier or attribute value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ids.get(name).or_else(|| self.attrs.get(name))
    }

    /// Identities of the children listed under `field`.
    pub fn children(&self, field: &str) -> &[Identifier] {
        self.children.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Child fields that currently list at least one child.
    pub fn child_fields(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// List a child identity under `field`. Adding the same identity twice is a no-op.
    pub fn add_child(&mut self, field: &str, identity: impl Into<Identifier>) {
        let identity = identity.into();
        let list = self.children.entry(field.to_string()).or_default();
        if !list.contains(&identity) {
            list.push(identity);
        }
    }

    /// Detach a child identity from `field`. Returns whether it was listed.
    pub fn remove_child(&mut self, field: &str, identity: &str) -> bool {
        match self.children.get_mut(field) {
            Some(list) => {
                let before = list.len();
                list.retain(|id| id != identity);
                before != list.len()
            }
            None => false,
        }
    }

    /// Apply changed attribute values to this record.
    pub fn update(&mut self, attrs: &Fields) -> Result<&Self> {
        if self.deleted {
            return Err(Error::stale(
                &self.type_name,
                &self.identity,
                "record was deleted",
            ));
        }
        if let Some(key) = attrs.keys().find(|k| self.ids.contains_key(*k)) {
            return Err(Error::Update {
                type_name: self.type_name.clone(),
                identifier: self.identity.clone(),
                cause: format!("identifier field '{key}' cannot be updated"),
            });
        }

        for (name, value) in attrs {
            self.attrs.insert(name.clone(), value.clone());
        }
        Ok(self)
    }

    /// Mark this record deleted. A deleted record is terminal.
    pub fn delete(&mut self) -> Result<&Self> {
        if self.deleted {
            return Err(Error::stale(
                &self.type_name,
                &self.identity,
                "record was already deleted",
            ));
        }
        self.deleted = true;
        Ok(self)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn status(&self) -> Option<&RecordStatus> {
        self.status.as_ref()
    }

    pub fn set_status(&mut self, status: Status, message: impl Into<String>) {
        self.status = Some(RecordStatus {
            status,
            message: message.into(),
        });
    }
}

fn unknown_field(model: &ModelSchema, field: &str) -> Error {
    Error::InvalidSchema(format!(
        "'{}' has no field named '{}'",
        model.type_name, field
    ))
}

/// Build the composite key for an ordered identifier mapping.
pub fn compose_identity(ids: &Fields) -> Result<Identifier> {
    let mut parts = Vec::with_capacity(ids.len());
    for (field, value) in ids {
        parts.push(render_key_part(field, value)?);
    }
    Ok(parts.join(KEY_SEPARATOR))
}

fn render_key_part(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Array(items) => {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                if item.is_array() || item.is_object() {
                    return Err(Error::InvalidIdentifier {
                        field: field.to_string(),
                    });
                }
                rendered.push(render_key_part(field, item)?);
            }
            Ok(format!("[{}]", rendered.join(",")))
        }
        Value::Object(_) => Err(Error::InvalidIdentifier {
            field: field.to_string(),
        }),
    }
}
