//! Registry-backed adapter.
//!
//! Load, create, update and delete are derived from the schema alone: every
//! declared field is read from the native record by name, dotted names
//! (`location__name`) walk relationships, and on write each relationship is
//! resolved to a native reference through [`RegistryClient::resolve_related`].
//!
//! Top-level types are enumerated concurrently and each listing is merged
//! into the store as soon as it completes. Children are listed lazily, one
//! scoped stream per parent.

use crate::{
    error::Result,
    loader::{split_path, NativeFields},
    Adapter, CreateRequest, Error, Fields, Identifier, LoadObserver, Loaders, ModelSchema, Record,
    Schema, Store, TypeName,
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use futures::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of top-level listings in flight at once.
pub const DEFAULT_LOAD_CONCURRENCY: usize = 4;

/// One entity as the registry returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeRecord {
    /// Opaque handle used to update or delete this entity later.
    pub reference: Value,
    pub fields: NativeFields,
}

impl NativeRecord {
    pub fn new(reference: Value, fields: NativeFields) -> Self {
        Self { reference, fields }
    }
}

/// Restricts a listing to the children of one parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub parent_type: TypeName,
    pub parent_reference: Value,
}

/// Client for the backing registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Enumerate entities of `type_name`, lazily, optionally scoped to a parent.
    fn list(&self, type_name: &str, scope: Option<Scope>) -> BoxStream<'_, Result<NativeRecord>>;

    /// Find the entity `relation` points at, given lookup fields on it.
    async fn resolve_related(&self, relation: &str, lookup: &NativeFields) -> Result<Option<Value>>;

    /// Insert an entity and return its reference. Children are inserted
    /// under `parent`, the same scope `list` later finds them by.
    async fn insert(&self, type_name: &str, fields: NativeFields, parent: Option<Scope>)
        -> Result<Value>;

    async fn update(&self, type_name: &str, reference: &Value, fields: NativeFields) -> Result<()>;

    async fn delete(&self, type_name: &str, reference: &Value) -> Result<()>;
}

/// Adapter over any [`RegistryClient`].
pub struct RegistryAdapter<C> {
    name: String,
    client: C,
    store: Store,
    loaders: Loaders,
    concurrency: usize,
    tolerate_load_errors: bool,
    references: HashMap<(TypeName, Identifier), Value>,
}

impl<C: RegistryClient> RegistryAdapter<C> {
    pub fn new(name: impl Into<String>, schema: Arc<Schema>, client: C) -> Self {
        Self {
            name: name.into(),
            client,
            store: Store::new(schema),
            loaders: Loaders::new(),
            concurrency: DEFAULT_LOAD_CONCURRENCY,
            tolerate_load_errors: false,
            references: HashMap::new(),
        }
    }

    pub fn with_loaders(mut self, loaders: Loaders) -> Self {
        self.loaders = loaders;
        self
    }

    /// Builder-style method to bound concurrent top-level listings.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Keep loading when a top-level listing fails, leaving that type empty.
    pub fn with_tolerate_load_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_load_errors = tolerate;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Native reference of a loaded or created record.
    pub fn reference(&self, type_name: &str, identity: &str) -> Option<&Value> {
        self.references
            .get(&(type_name.to_string(), identity.to_string()))
    }

    fn reference_of(&self, record: &Record) -> Result<Value> {
        self.reference(record.type_name(), record.identity())
            .cloned()
            .ok_or_else(|| Error::StaleRecord {
                type_name: record.type_name().to_string(),
                identifier: record.identity().to_string(),
                cause: "no native reference".to_string(),
            })
    }

    /// Turn record values into native fields, resolving relationships.
    async fn native_fields(&self, values: &Fields) -> std::result::Result<NativeFields, String> {
        let mut native = NativeFields::new();
        let mut related: IndexMap<&str, NativeFields> = IndexMap::new();
        for (name, value) in values {
            match split_path(name) {
                Some((relation, rest)) => {
                    related
                        .entry(relation)
                        .or_default()
                        .insert(rest.to_string(), value.clone());
                }
                None => {
                    native.insert(name.clone(), value.clone());
                }
            }
        }

        for (relation, lookup) in related {
            let reference = if lookup.values().all(Value::is_null) {
                Value::Null
            } else {
                self.client
                    .resolve_related(relation, &lookup)
                    .await
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| {
                        format!("related {relation} {} not found", Value::Object(lookup.clone()))
                    })?
            };
            native.insert(relation.to_string(), reference);
        }
        Ok(native)
    }
}

/// Changed attributes plus every sibling field of a touched relationship, so
/// relationship lookups are always complete.
fn write_values(record: &Record, attrs: &Fields) -> Fields {
    let mut values = attrs.clone();
    let touched: Vec<&str> = attrs
        .keys()
        .filter_map(|name| split_path(name).map(|(relation, _)| relation))
        .collect();

    for (name, value) in record.ids().iter().chain(record.get_attrs().iter()) {
        let sibling = split_path(name).is_some_and(|(relation, _)| touched.contains(&relation));
        if sibling && !values.contains_key(name) {
            values.insert(name.clone(), value.clone());
        }
    }
    values
}

/// Map a client error on a write into the error attributed to `record`.
fn write_error(
    error: Error,
    type_name: &str,
    identity: &str,
    wrap: fn(TypeName, Identifier, String) -> Error,
) -> Error {
    match error {
        Error::ObjectNotFound { .. } => Error::StaleRecord {
            type_name: type_name.to_string(),
            identifier: identity.to_string(),
            cause: "backing entity vanished".to_string(),
        },
        Error::StaleRecord { .. } | Error::Cancelled => error,
        other => wrap(type_name.to_string(), identity.to_string(), other.to_string()),
    }
}

fn creation_failed(type_name: TypeName, identifier: Identifier, cause: String) -> Error {
    Error::Creation {
        type_name,
        identifier,
        cause,
    }
}

fn update_failed(type_name: TypeName, identifier: Identifier, cause: String) -> Error {
    Error::Update {
        type_name,
        identifier,
        cause,
    }
}

/// Borrowed state for merging listings into the store.
struct Merge<'a, C> {
    adapter: &'a str,
    client: &'a C,
    schema: &'a Schema,
    loaders: &'a Loaders,
    store: &'a mut Store,
    references: &'a mut HashMap<(TypeName, Identifier), Value>,
}

impl<'a, C: RegistryClient> Merge<'a, C> {
    fn load_error(&self, error: Error) -> Error {
        match error {
            Error::Load { .. } | Error::Cancelled => error,
            other => Error::Load {
                adapter: self.adapter.to_string(),
                cause: other.to_string(),
            },
        }
    }

    /// Add one native record and, recursively, its children.
    fn add<'b>(
        &'b mut self,
        type_name: &'b str,
        native: NativeRecord,
        parent: Option<(&'b str, &'b str)>,
    ) -> BoxFuture<'b, Result<usize>> {
        async move {
            let client: &'a C = self.client;
            let model: &'a ModelSchema = self.schema.model(type_name)?;
            let record = self.loaders.load(model, &native.fields)?;
            let identity = record.identity().to_string();

            match parent {
                Some((parent_type, parent_identity)) => {
                    self.store.add_child(parent_type, parent_identity, record)?
                }
                None => self.store.add(record)?,
            }
            self.references
                .insert((type_name.to_string(), identity.clone()), native.reference.clone());

            let mut loaded = 1;
            for child in &model.children {
                let scope = Scope {
                    parent_type: type_name.to_string(),
                    parent_reference: native.reference.clone(),
                };
                let mut rows = client.list(&child.type_name, Some(scope));
                while let Some(row) = rows.next().await {
                    let row = row.map_err(|e| self.load_error(e))?;
                    loaded += self
                        .add(&child.type_name, row, Some((type_name, &identity)))
                        .await?;
                }
            }
            Ok(loaded)
        }
        .boxed()
    }
}

#[async_trait]
impl<C: RegistryClient> Adapter for RegistryAdapter<C> {
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
        self.references.clear();

        let schema = self.store.schema().clone();
        let tolerate = self.tolerate_load_errors;
        let client = &self.client;
        let mut merge = Merge {
            adapter: &self.name,
            client,
            schema: &schema,
            loaders: &self.loaders,
            store: &mut self.store,
            references: &mut self.references,
        };

        let top_level: Vec<TypeName> = schema.top_level().to_vec();
        let mut fetches = stream::iter(top_level.into_iter().map(move |type_name| {
            async move {
                if cancel.is_cancelled() {
                    return (type_name, Err(Error::Cancelled));
                }
                let rows: Result<Vec<NativeRecord>> =
                    client.list(&type_name, None).try_collect().await;
                (type_name, rows)
            }
            .boxed()
        }))
        .buffered(self.concurrency);

        while let Some((type_name, rows)) = fetches.next().await {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let rows = match rows {
                Ok(rows) => rows,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(error) if tolerate => {
                    warn!(adapter = %self.name, type_name = %type_name, error = %error, "listing failed, type left empty");
                    continue;
                }
                Err(error) => return Err(merge.load_error(error)),
            };

            let mut loaded = 0;
            for row in rows {
                loaded += merge.add(&type_name, row, None).await?;
            }
            debug!(adapter = %self.name, type_name = %type_name, loaded, "merged listing");
            observer.type_loaded(&type_name, loaded);
        }

        info!(
            adapter = %self.name,
            records = self.store.count(None),
            "loaded registry"
        );
        Ok(())
    }

    async fn create(&mut self, request: &CreateRequest) -> Result<Record> {
        let model = self.store.schema().model(&request.type_name)?.clone();
        let record = Record::new(&model, request.ids.clone(), request.attrs.clone())?;

        let scope = match &request.parent {
            Some(parent) => {
                let parent_reference = self
                    .reference(&parent.type_name, &parent.identity)
                    .cloned()
                    .ok_or_else(|| {
                        creation_failed(
                            model.type_name.clone(),
                            record.identity().to_string(),
                            format!(
                                "parent {} '{}' has no native reference",
                                parent.type_name, parent.identity
                            ),
                        )
                    })?;
                Some(Scope {
                    parent_type: parent.type_name.clone(),
                    parent_reference,
                })
            }
            None => None,
        };

        let values: Fields = record
            .ids()
            .iter()
            .chain(record.get_attrs().iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let fields = self
            .native_fields(&values)
            .await
            .map_err(|cause| creation_failed(model.type_name.clone(), record.identity().to_string(), cause))?;

        let reference = self
            .client
            .insert(&model.type_name, fields, scope)
            .await
            .map_err(|e| write_error(e, &model.type_name, record.identity(), creation_failed))?;

        self.references.insert(
            (model.type_name.clone(), record.identity().to_string()),
            reference,
        );
        Ok(record)
    }

    async fn update(&mut self, record: &Record, attrs: &Fields) -> Result<()> {
        let reference = self.reference_of(record)?;
        let fields = self
            .native_fields(&write_values(record, attrs))
            .await
            .map_err(|cause| update_failed(record.type_name().to_string(), record.identity().to_string(), cause))?;

        self.client
            .update(record.type_name(), &reference, fields)
            .await
            .map_err(|e| write_error(e, record.type_name(), record.identity(), update_failed))
    }

    async fn delete(&mut self, record: &Record) -> Result<()> {
        let reference = self.reference_of(record)?;
        self.client
            .delete(record.type_name(), &reference)
            .await
            .map_err(|e| write_error(e, record.type_name(), record.identity(), update_failed))?;

        self.references
            .remove(&(record.type_name().to_string(), record.identity().to_string()));
        Ok(())
    }
}
