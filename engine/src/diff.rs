//! Diff engine: compare two stores and describe how to turn target into source.
//!
//! # Algorithm
//!
//! 1. Walk the declared top-level types in schema order
//! 2. Union the identities present on either side, sorted
//! 3. Classify each identity as create, delete, update or no-change
//! 4. Recurse into declared child types, scoped to the matched parents
//! 5. Children of a created parent are created, children of a deleted parent deleted
//!
//! The result is a pure function of the two stores' contents: insertion order
//! on either side never leaks into the output.

use crate::{
    error::Result, options::TypeOptions, DiffOptions, Error, FieldName, Fields, Identifier,
    ModelSchema, Record, Schema, Store, TypeName,
};
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What must happen to one record on the target side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffAction {
    Create,
    Update,
    Delete,
    NoChange,
}

impl DiffAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffAction::Create => "create",
            DiffAction::Update => "update",
            DiffAction::Delete => "delete",
            DiffAction::NoChange => "no-change",
        }
    }
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Old (target) and new (source) value of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrChange {
    pub old: Value,
    pub new: Value,
}

impl Serialize for AttrChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.old)?;
        seq.serialize_element(&self.new)?;
        seq.end()
    }
}

/// One node of the diff tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffElement {
    pub type_name: TypeName,
    pub identity: Identifier,
    pub action: DiffAction,
    /// Identifier values, from the source when present there.
    pub ids: Fields,
    /// Changed attributes. A create lists every source attribute, a delete
    /// every target attribute, an update only the fields that differ.
    pub changes: IndexMap<FieldName, AttrChange>,
    pub children: Diff,
}

impl DiffElement {
    /// New values of every changed attribute.
    pub fn new_attrs(&self) -> Fields {
        self.changes
            .iter()
            .map(|(name, change)| (name.clone(), change.new.clone()))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.action != DiffAction::NoChange || self.children.has_changes()
    }
}

impl Serialize for DiffElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DiffElement", 3)?;
        state.serialize_field("action", &self.action)?;
        state.serialize_field("attrs", &self.changes)?;
        state.serialize_field("children", &self.children)?;
        state.end()
    }
}

/// Counts of diff actions across a whole tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
    /// Records excluded by a skip flag.
    pub skip: usize,
}

impl DiffSummary {
    fn count(&mut self, action: DiffAction) {
        match action {
            DiffAction::Create => self.create += 1,
            DiffAction::Update => self.update += 1,
            DiffAction::Delete => self.delete += 1,
            DiffAction::NoChange => self.no_change += 1,
        }
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "create: {}, update: {}, delete: {}, no-change: {}, skip: {}",
            self.create, self.update, self.delete, self.no_change, self.skip
        )
    }
}

/// The result of comparing two stores.
///
/// Serializes as `{type: {identity: {action, attrs: {field: [old, new]}, children}}}`
/// with types in schema order and identities sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    groups: IndexMap<TypeName, Vec<DiffElement>>,
    skipped: usize,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the diff holds no elements at all.
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Types with at least one element, in schema order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Elements of one type, sorted by identity.
    pub fn elements(&self, type_name: &str) -> &[DiffElement] {
        self.groups.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiffElement> {
        self.groups.values().flatten()
    }

    /// Number of elements at this level.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    fn push(&mut self, element: DiffElement) {
        self.groups
            .entry(element.type_name.clone())
            .or_default()
            .push(element);
    }

    /// Action counts over the whole tree.
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        self.accumulate(&mut summary);
        summary
    }

    fn accumulate(&self, summary: &mut DiffSummary) {
        summary.skip += self.skipped;
        for element in self.iter() {
            summary.count(element.action);
            element.children.accumulate(summary);
        }
    }

    /// Whether anything anywhere in the tree is not a no-change.
    pub fn has_changes(&self) -> bool {
        self.iter().any(DiffElement::has_changes)
    }

    /// Find an element by type and identity at any depth.
    pub fn find(&self, type_name: &str, identity: &str) -> Option<&DiffElement> {
        if let Some(found) = self
            .elements(type_name)
            .iter()
            .find(|e| e.identity == identity)
        {
            return Some(found);
        }
        self.iter()
            .find_map(|element| element.children.find(type_name, identity))
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }
}

impl Serialize for Diff {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct ByIdentity<'a>(&'a [DiffElement]);

        impl Serialize for ByIdentity<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for element in self.0 {
                    map.serialize_entry(&element.identity, element)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (type_name, elements) in &self.groups {
            map.serialize_entry(type_name, &ByIdentity(elements))?;
        }
        map.end()
    }
}

/// Compare `source` against `target`.
pub fn diff_stores(source: &Store, target: &Store, options: &DiffOptions) -> Result<Diff> {
    Differ::new(source, target, options).diff()
}

/// Walks two stores sharing a schema and builds the [`Diff`] tree.
pub struct Differ<'a> {
    schema: &'a Schema,
    source: &'a Store,
    target: &'a Store,
    options: &'a DiffOptions,
}

/// How unmatched records below a one-sided parent are treated.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    Matched,
    Forced,
}

impl<'a> Differ<'a> {
    pub fn new(source: &'a Store, target: &'a Store, options: &'a DiffOptions) -> Self {
        Self {
            schema: source.schema(),
            source,
            target,
            options,
        }
    }

    /// Diff every top-level type in declared order.
    pub fn diff(&self) -> Result<Diff> {
        let mut diff = Diff::new();
        for type_name in self.schema.top_level() {
            self.diff_group(
                type_name,
                self.source.get_all(type_name),
                self.target.get_all(type_name),
                Scope::Matched,
                &mut diff,
            )?;
        }
        tracing::debug!(summary = %diff.summary(), "diff computed");
        Ok(diff)
    }

    fn diff_group(
        &self,
        type_name: &str,
        source: Vec<&Record>,
        target: Vec<&Record>,
        scope: Scope,
        diff: &mut Diff,
    ) -> Result<()> {
        let model = self.schema.model(type_name)?;
        let options = self.options.for_type(type_name);

        let source: BTreeMap<&str, &Record> = source.into_iter().map(|r| (r.identity(), r)).collect();
        let target: BTreeMap<&str, &Record> = target.into_iter().map(|r| (r.identity(), r)).collect();
        let identities: BTreeSet<&str> = source.keys().chain(target.keys()).copied().collect();

        if options.skip {
            diff.skipped += identities.len();
            return Ok(());
        }

        for identity in identities {
            let element = match (source.get(identity), target.get(identity)) {
                (Some(src), None) => {
                    if scope == Scope::Matched && options.skip_unmatched_source {
                        diff.skipped += 1;
                        continue;
                    }
                    self.one_sided(model, &options, src, DiffAction::Create)?
                }
                (None, Some(dst)) => {
                    if scope == Scope::Matched && options.skip_unmatched_target {
                        diff.skipped += 1;
                        continue;
                    }
                    if self.holds_skipped(model, dst)? {
                        tracing::debug!(
                            type_name = %model.type_name,
                            identifier = %identity,
                            "not deleting, subtree holds skipped types"
                        );
                        diff.skipped += 1;
                        continue;
                    }
                    self.one_sided(model, &options, dst, DiffAction::Delete)?
                }
                (Some(src), Some(dst)) => self.matched(model, &options, src, dst)?,
                (None, None) => continue,
            };
            diff.push(element);
        }
        Ok(())
    }

    fn matched(
        &self,
        model: &ModelSchema,
        options: &TypeOptions,
        source: &Record,
        target: &Record,
    ) -> Result<DiffElement> {
        check_attributes(model, options, source)?;
        check_attributes(model, options, target)?;

        let mut changes = IndexMap::new();
        for def in &model.attributes {
            if options.ignore_fields.contains(&def.name) {
                continue;
            }
            let new = source.attr(&def.name).cloned().unwrap_or(Value::Null);
            let old = target.attr(&def.name).cloned().unwrap_or(Value::Null);
            if new != old {
                changes.insert(def.name.clone(), AttrChange { old, new });
            }
        }

        let action = if changes.is_empty() {
            DiffAction::NoChange
        } else {
            DiffAction::Update
        };

        let mut children = Diff::new();
        for child in &model.children {
            self.diff_group(
                &child.type_name,
                self.source.children_of(source, &child.type_name)?,
                self.target.children_of(target, &child.type_name)?,
                Scope::Matched,
                &mut children,
            )?;
        }

        Ok(DiffElement {
            type_name: model.type_name.clone(),
            identity: source.identity().to_string(),
            action,
            ids: source.ids().clone(),
            changes,
            children,
        })
    }

    /// Whether any target descendant of `record` belongs to a skipped type.
    /// Such a record cannot be deleted without orphaning those descendants.
    fn holds_skipped(&self, model: &ModelSchema, record: &Record) -> Result<bool> {
        for child in &model.children {
            let children = self.target.children_of(record, &child.type_name)?;
            if children.is_empty() {
                continue;
            }
            if self.options.for_type(&child.type_name).skip {
                return Ok(true);
            }
            let child_model = self.schema.model(&child.type_name)?;
            for grandchild in children {
                if self.holds_skipped(child_model, grandchild)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// A record present on one side only, with its whole subtree.
    fn one_sided(
        &self,
        model: &ModelSchema,
        options: &TypeOptions,
        record: &Record,
        action: DiffAction,
    ) -> Result<DiffElement> {
        check_attributes(model, options, record)?;

        let changes = record
            .get_attrs()
            .iter()
            .map(|(name, value)| {
                let change = match action {
                    DiffAction::Delete => AttrChange {
                        old: value.clone(),
                        new: Value::Null,
                    },
                    _ => AttrChange {
                        old: Value::Null,
                        new: value.clone(),
                    },
                };
                (name.clone(), change)
            })
            .collect();

        let store = match action {
            DiffAction::Delete => self.target,
            _ => self.source,
        };

        let mut children = Diff::new();
        for child in &model.children {
            let records = store.children_of(record, &child.type_name)?;
            let (source, target) = match action {
                DiffAction::Delete => (Vec::new(), records),
                _ => (records, Vec::new()),
            };
            self.diff_group(&child.type_name, source, target, Scope::Forced, &mut children)?;
        }

        Ok(DiffElement {
            type_name: model.type_name.clone(),
            identity: record.identity().to_string(),
            action,
            ids: record.ids().clone(),
            changes,
            children,
        })
    }
}

/// Every compared attribute must be present on a loaded record.
fn check_attributes(model: &ModelSchema, options: &TypeOptions, record: &Record) -> Result<()> {
    for def in &model.attributes {
        if options.ignore_fields.contains(&def.name) {
            continue;
        }
        if record.attr(&def.name).is_none() {
            return Err(Error::SchemaMismatch {
                type_name: model.type_name.clone(),
                field: def.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::TypeOptions;
    use crate::schema::{FieldDef, FieldType};
    use serde_json::json;
    use std::sync::Arc;

    fn fields(value: Value) -> Fields {
        value
            .as_object()
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    fn test_schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
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
                        .with_attribute(FieldDef::optional("name", FieldType::String))
                        .with_attribute(FieldDef::optional("last_seen", FieldType::String)),
                ),
        )
    }

    fn add_vlan(store: &mut Store, vid: i64, name: &str) {
        let model = store.schema().model("vlan").unwrap().clone();
        let record = Record::new(
            &model,
            fields(json!({"vid": vid})),
            fields(json!({"name": name, "last_seen": format!("t{vid}")})),
        )
        .unwrap();
        store.add(record).unwrap();
    }

    fn add_device(store: &mut Store, name: &str, slots: &[(i64, &str)]) {
        let schema = store.schema().clone();
        let device = Record::new(
            schema.model("device").unwrap(),
            fields(json!({"name": name})),
            fields(json!({"role": "leaf"})),
        )
        .unwrap();
        store.add(device).unwrap();
        for (slot, model) in slots {
            let container = Record::new(
                schema.model("container").unwrap(),
                fields(json!({"device": name, "slot": slot})),
                fields(json!({"model": model})),
            )
            .unwrap();
            store.add_child("device", name, container).unwrap();
        }
    }

    #[test]
    fn create_update_delete_classification() {
        let schema = test_schema();
        let mut source = Store::new(schema.clone());
        let mut target = Store::new(schema);
        add_vlan(&mut source, 10, "A");
        add_vlan(&mut source, 30, "C");
        add_vlan(&mut target, 10, "B");
        add_vlan(&mut target, 20, "X");
        add_vlan(&mut target, 30, "C");

        let diff = diff_stores(&source, &target, &DiffOptions::new()).unwrap();

        assert_eq!(diff.find("vlan", "10").unwrap().action, DiffAction::Update);
        assert_eq!(diff.find("vlan", "20").unwrap().action, DiffAction::Delete);
        assert_eq!(diff.find("vlan", "30").unwrap().action, DiffAction::NoChange);

        let update = diff.find("vlan", "10").unwrap();
        assert_eq!(update.changes.len(), 1);
        assert_eq!(update.changes["name"], AttrChange { old: json!("B"), new: json!("A") });

        let summary = diff.summary();
        assert_eq!((summary.create, summary.update, summary.delete, summary.no_change), (0, 1, 1, 1));
        assert!(diff.has_changes());
    }

    #[test]
    fn serialized_shape() {
        let schema = test_schema();
        let mut source = Store::new(schema.clone());
        let target = Store::new(schema);
        add_vlan(&mut source, 10, "A");

        let diff = diff_stores(&source, &target, &DiffOptions::new()).unwrap();
        assert_eq!(
            diff.to_value().unwrap(),
            json!({
                "vlan": {
                    "10": {
                        "action": "create",
                        "attrs": {"name": [null, "A"], "last_seen": [null, "t10"]},
                        "children": {}
                    }
                }
            })
        );
    }

    #[test]
    fn created_parent_creates_all_children() {
        let schema = test_schema();
        let mut source = Store::new(schema.clone());
        let target = Store::new(schema);
        add_device(&mut source, "sw1", &[(1, "lc-a"), (2, "lc-b")]);

        let options = DiffOptions::new().with_type(
            "container",
            TypeOptions::new().with_skip_unmatched_source(true),
        );
        let diff = diff_stores(&source, &target, &options).unwrap();

        let device = diff.find("device", "sw1").unwrap();
        assert_eq!(device.action, DiffAction::Create);
        let children = device.children.elements("container");
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.action == DiffAction::Create));
    }

    #[test]
    fn deleted_parent_deletes_all_children() {
        let schema = test_schema();
        let source = Store::new(schema.clone());
        let mut target = Store::new(schema);
        add_device(&mut target, "sw1", &[(1, "lc-a")]);

        let diff = diff_stores(&source, &target, &DiffOptions::new()).unwrap();
        let device = diff.find("device", "sw1").unwrap();
        assert_eq!(device.action, DiffAction::Delete);
        assert_eq!(device.changes["role"], AttrChange { old: json!("leaf"), new: Value::Null });
        assert_eq!(diff.find("container", "sw1__1").unwrap().action, DiffAction::Delete);
    }

    #[test]
    fn no_change_parent_with_changed_child() {
        let schema = test_schema();
        let mut source = Store::new(schema.clone());
        let mut target = Store::new(schema);
        add_device(&mut source, "sw1", &[(1, "lc-a"), (2, "lc-b")]);
        add_device(&mut target, "sw1", &[(1, "lc-z"), (3, "lc-c")]);

        let diff = diff_stores(&source, &target, &DiffOptions::new()).unwrap();
        let device = diff.find("device", "sw1").unwrap();
        assert_eq!(device.action, DiffAction::NoChange);
        assert!(device.has_changes());

        let actions: Vec<_> = device
            .children
            .elements("container")
            .iter()
            .map(|c| (c.identity.as_str(), c.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("sw1__1", DiffAction::Update),
                ("sw1__2", DiffAction::Create),
                ("sw1__3", DiffAction::Delete),
            ]
        );
    }

    #[test]
    fn ignored_fields_and_skip_flags() {
        let schema = test_schema();
        let mut source = Store::new(schema.clone());
        let mut target = Store::new(schema);
        add_vlan(&mut source, 10, "A");
        add_vlan(&mut target, 20, "B");
        add_device(&mut source, "sw1", &[]);

        let model = source.schema().model("vlan").unwrap().clone();
        target
            .add(
                Record::new(
                    &model,
                    fields(json!({"vid": 10})),
                    fields(json!({"name": "A", "last_seen": "yesterday"})),
                )
                .unwrap(),
            )
            .unwrap();

        let options = DiffOptions::new()
            .with_global(TypeOptions::new().with_ignored_field("last_seen"))
            .with_type("vlan", TypeOptions::new().with_skip_unmatched_target(true))
            .with_type("device", TypeOptions::skipped());
        let diff = diff_stores(&source, &target, &options).unwrap();

        assert_eq!(diff.find("vlan", "10").unwrap().action, DiffAction::NoChange);
        assert!(diff.find("vlan", "20").is_none());
        assert!(diff.find("device", "sw1").is_none());
        assert_eq!(diff.summary().skip, 2);
        assert!(!diff.has_changes());
    }

    #[test]
    fn delete_held_back_by_skipped_children() {
        let schema = test_schema();
        let source = Store::new(schema.clone());
        let mut target = Store::new(schema);
        add_device(&mut target, "sw1", &[(1, "lc-a")]);
        add_device(&mut target, "sw2", &[]);

        let options = DiffOptions::new().with_type("container", TypeOptions::skipped());
        let diff = diff_stores(&source, &target, &options).unwrap();

        assert!(diff.find("device", "sw1").is_none());
        assert_eq!(diff.find("device", "sw2").unwrap().action, DiffAction::Delete);
        assert_eq!(diff.summary().skip, 1);
        assert_eq!(diff.summary().delete, 1);
    }

    #[test]
    fn missing_attribute_is_schema_mismatch() {
        let schema = test_schema();
        let mut source = Store::new(schema.clone());
        let mut target = Store::new(schema.clone());
        add_vlan(&mut source, 10, "A");
        let partial = Record::new(
            schema.model("vlan").unwrap(),
            fields(json!({"vid": 10})),
            fields(json!({"name": "A"})),
        )
        .unwrap();
        target.add(partial).unwrap();

        let result = diff_stores(&source, &target, &DiffOptions::new());
        assert!(matches!(
            result,
            Err(Error::SchemaMismatch { field, .. }) if field == "last_seen"
        ));

        let options = DiffOptions::new().with_global(TypeOptions::new().with_ignored_field("last_seen"));
        assert!(diff_stores(&source, &target, &options).is_ok());
    }

    #[test]
    fn empty_stores_give_empty_diff() {
        let schema = test_schema();
        let diff = diff_stores(&Store::new(schema.clone()), &Store::new(schema), &DiffOptions::new()).unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.to_json().unwrap(), "{}");
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_vlans() -> impl Strategy<Value = Vec<(i64, String)>> {
            prop::collection::btree_map(1i64..200, "[a-c]{1,2}", 0..20)
                .prop_map(|map| map.into_iter().collect())
        }

        fn store_from(schema: &Arc<Schema>, vlans: &[(i64, String)]) -> Store {
            let mut store = Store::new(schema.clone());
            for (vid, name) in vlans {
                add_vlan(&mut store, *vid, name);
            }
            store
        }

        proptest! {
            #[test]
            fn prop_diff_independent_of_insertion_order(
                source in arb_vlans(),
                target in arb_vlans(),
            ) {
                let schema = test_schema();
                let forward = diff_stores(
                    &store_from(&schema, &source),
                    &store_from(&schema, &target),
                    &DiffOptions::new(),
                ).unwrap();

                let mut source_rev = source.clone();
                source_rev.reverse();
                let mut target_rev = target.clone();
                target_rev.reverse();
                let backward = diff_stores(
                    &store_from(&schema, &source_rev),
                    &store_from(&schema, &target_rev),
                    &DiffOptions::new(),
                ).unwrap();

                prop_assert_eq!(forward.to_json().unwrap(), backward.to_json().unwrap());
            }

            #[test]
            fn prop_self_diff_has_no_changes(vlans in arb_vlans()) {
                let schema = test_schema();
                let store = store_from(&schema, &vlans);
                let diff = diff_stores(&store, &store, &DiffOptions::new()).unwrap();

                prop_assert!(!diff.has_changes());
                prop_assert_eq!(diff.summary().no_change, vlans.len());
            }
        }
    }
}
