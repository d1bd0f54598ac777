//! Schema descriptors for record types.
//!
//! Every record type is described once by a [`ModelSchema`]: its ordered
//! identifier fields, ordered attribute fields and the child types indexed
//! under it. A [`Schema`] groups the models of one sync run together with the
//! ordered list of top-level types and is validated once before any store is
//! populated.

use crate::{error::Result, Error, FieldName, TypeName};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of an identifier or attribute field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name. May be a dotted relationship path such as `location__name`.
    pub name: FieldName,
    /// Field type
    pub field_type: FieldType,
    /// Whether `null` is rejected for this field
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<FieldName>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<FieldName>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Coerce a value to this field's declared type.
    ///
    /// Both sides of a diff pass through the same coercion, so `"10"` loaded
    /// from one system and `10` loaded from another compare equal on an
    /// `Int` field.
    pub fn normalize(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return if self.required {
                Err(Error::MissingRequiredField(self.name.clone()))
            } else {
                Ok(Value::Null)
            };
        }

        let coerced = match (self.field_type, &value) {
            (FieldType::Json, _) => Some(value.clone()),
            (FieldType::String, Value::String(_)) => Some(value.clone()),
            (FieldType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (FieldType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (FieldType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
            (FieldType::Int, Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| Value::from(f as i64)),
            (FieldType::Int, Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| s.parse::<u64>().map(Value::from))
                    .ok()
            }
            (FieldType::Float, Value::Number(n)) => n
                .as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            (FieldType::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            (FieldType::Bool, Value::Bool(_)) => Some(value.clone()),
            (FieldType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        };

        coerced.ok_or_else(|| Error::TypeMismatch {
            field: self.name.clone(),
            expected: self.field_type.to_string(),
            got: json_type_name(&value).to_string(),
        })
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// A child type indexed under a parent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSpec {
    /// The child record type
    pub type_name: TypeName,
    /// Field on the parent under which child identities are listed
    pub field: FieldName,
}

/// Descriptor for one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
    /// Type tag, e.g. `device`
    pub type_name: TypeName,
    /// Ordered fields forming the unique key
    pub identifiers: Vec<FieldDef>,
    /// Ordered non-key comparable fields
    #[serde(default)]
    pub attributes: Vec<FieldDef>,
    /// Child types, in traversal order
    #[serde(default)]
    pub children: Vec<ChildSpec>,
}

impl ModelSchema {
    /// Create an empty model descriptor.
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self {
            type_name: type_name.into(),
            identifiers: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style method to append an identifier field.
    pub fn with_identifier(mut self, field: FieldDef) -> Self {
        self.identifiers.push(field);
        self
    }

    /// Builder-style method to append an attribute field.
    pub fn with_attribute(mut self, field: FieldDef) -> Self {
        self.attributes.push(field);
        self
    }

    /// Builder-style method to declare a child type.
    pub fn with_child(mut self, type_name: impl Into<TypeName>, field: impl Into<FieldName>) -> Self {
        self.children.push(ChildSpec {
            type_name: type_name.into(),
            field: field.into(),
        });
        self
    }

    pub fn identifier_names(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(|f| f.name.as_str())
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|f| f.name.as_str())
    }

    /// Look up an identifier or attribute definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.identifiers
            .iter()
            .chain(self.attributes.iter())
            .find(|f| f.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&FieldDef> {
        self.attributes.iter().find(|f| f.name == name)
    }

    /// The parent field under which children of `child_type` are listed.
    pub fn child_field(&self, child_type: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|c| c.type_name == child_type)
            .map(|c| c.field.as_str())
    }

    /// The child type listed under `field`, if `field` is a child field.
    pub fn child_type(&self, field: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.type_name.as_str())
    }

    fn validate_fields(&self) -> Result<()> {
        if self.identifiers.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "'{}' declares no identifier fields",
                self.type_name
            )));
        }

        let mut seen = HashSet::new();
        let names = self
            .identifier_names()
            .chain(self.attribute_names())
            .chain(self.children.iter().map(|c| c.field.as_str()));
        for name in names {
            if !seen.insert(name) {
                return Err(Error::InvalidSchema(format!(
                    "'{}' declares field '{}' more than once",
                    self.type_name, name
                )));
            }
        }

        Ok(())
    }
}

/// Schema for one sync run: every model plus the ordered top-level types.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "SchemaDef", into = "SchemaDef")]
pub struct Schema {
    top_level: Vec<TypeName>,
    models: IndexMap<TypeName, ModelSchema>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaDef {
    top_level: Vec<TypeName>,
    models: Vec<ModelSchema>,
}

impl From<SchemaDef> for Schema {
    fn from(def: SchemaDef) -> Self {
        let mut schema = Schema::new().with_top_level(def.top_level);
        for model in def.models {
            schema.add_model(model);
        }
        schema
    }
}

impl From<Schema> for SchemaDef {
    fn from(schema: Schema) -> Self {
        Self {
            top_level: schema.top_level,
            models: schema.models.into_values().collect(),
        }
    }
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model to the schema, replacing any model of the same type.
    pub fn add_model(&mut self, model: ModelSchema) -> &mut Self {
        self.models.insert(model.type_name.clone(), model);
        self
    }

    /// Builder-style method to add a model.
    pub fn with_model(mut self, model: ModelSchema) -> Self {
        self.add_model(model);
        self
    }

    /// Builder-style method to set the ordered top-level types.
    pub fn with_top_level<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TypeName>,
    {
        self.top_level = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn top_level(&self) -> &[TypeName] {
        &self.top_level
    }

    /// Get a model by type name.
    pub fn model(&self, type_name: &str) -> Result<&ModelSchema> {
        self.models
            .get(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))
    }

    pub fn get_model(&self, type_name: &str) -> Option<&ModelSchema> {
        self.models.get(type_name)
    }

    /// All models in declaration order.
    pub fn models(&self) -> impl Iterator<Item = &ModelSchema> {
        self.models.values()
    }

    /// Validate the schema once before any store is populated.
    pub fn validate(&self) -> Result<()> {
        for type_name in &self.top_level {
            if !self.models.contains_key(type_name) {
                return Err(Error::InvalidSchema(format!(
                    "top-level type '{type_name}' has no model"
                )));
            }
        }

        let mut children_of: HashMap<&str, Vec<&str>> = HashMap::new();
        for model in self.models.values() {
            model.validate_fields()?;
            for child in &model.children {
                if !self.models.contains_key(&child.type_name) {
                    return Err(Error::InvalidSchema(format!(
                        "'{}' declares undeclared child type '{}'",
                        model.type_name, child.type_name
                    )));
                }
                if self.top_level.contains(&child.type_name) {
                    return Err(Error::InvalidSchema(format!(
                        "'{}' is top-level and cannot be a child of '{}'",
                        child.type_name, model.type_name
                    )));
                }
                children_of
                    .entry(model.type_name.as_str())
                    .or_default()
                    .push(child.type_name.as_str());
            }
        }

        self.check_acyclic(&children_of)?;

        let mut reachable: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = self.top_level.iter().map(String::as_str).collect();
        while let Some(type_name) = queue.pop_front() {
            if reachable.insert(type_name) {
                if let Some(children) = children_of.get(type_name) {
                    queue.extend(children.iter().copied());
                }
            }
        }
        if let Some(orphan) = self
            .models
            .keys()
            .find(|name| !reachable.contains(name.as_str()))
        {
            return Err(Error::InvalidSchema(format!(
                "'{orphan}' is not reachable from any top-level type"
            )));
        }

        Ok(())
    }

    fn check_acyclic(&self, children_of: &HashMap<&str, Vec<&str>>) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            node: &'a str,
            children_of: &HashMap<&'a str, Vec<&'a str>>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<()> {
            match marks.get(node) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(Error::InvalidSchema(format!(
                        "child relationship cycle through '{node}'"
                    )))
                }
                None => {}
            }
            marks.insert(node, Mark::Visiting);
            for child in children_of.get(node).into_iter().flatten() {
                visit(*child, children_of, marks)?;
            }
            marks.insert(node, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for name in self.models.keys() {
            visit(name, children_of, &mut marks)?;
        }
        Ok(())
    }
}
