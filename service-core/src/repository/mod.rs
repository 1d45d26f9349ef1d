//! Generic data access over a pluggable [`Store`].
//!
//! A [`Repository`] is parameterized over one [`Entity`] type and offers the
//! lookup, pagination, bulk and update operations services need. Lookups
//! that find nothing return `None`/`false` instead of failing.

pub mod entity;
pub mod memory;
pub mod mongo;
pub mod query;
pub mod store;

pub use entity::{Entity, Record, Relation, SoftDelete, RECORD_FIELDS};
pub use memory::{MemoryDatabase, MemoryStore};
pub use mongo::MongoStore;
pub use query::{Count, Direction, Filter, Op, Query, Sort};
pub use store::Store;

use crate::envelope::Meta;
use crate::error::{Classify, ErrorKind};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Field name to value assignments used by `create` and `update`.
pub type Fields = Map<String, Value>;

/// Build [`Fields`] from `"name": value` pairs.
#[macro_export]
macro_rules! fields {
    ($($key:literal : $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut fields = $crate::repository::Fields::new();
        $( fields.insert($key.to_string(), $crate::serde_json::json!($value)); )*
        fields
    }};
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    InvalidValue(String),

    #[error("{collection} has no field {field}")]
    UnknownField {
        collection: &'static str,
        field: String,
    },

    #[error("{collection} {id} does not exist")]
    NotFound { collection: &'static str, id: Uuid },

    #[error("duplicate value for {field} in {collection}")]
    Duplicate {
        collection: &'static str,
        field: String,
    },

    #[error("cannot decode {collection} entity: {reason}")]
    Decode {
        collection: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    #[error(transparent)]
    Bson(#[from] mongodb::bson::ser::Error),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidValue(_) => ErrorKind::InvalidValue,
            StoreError::UnknownField { .. } | StoreError::Decode { .. } => ErrorKind::TypeMismatch,
            StoreError::NotFound { .. } => ErrorKind::Lookup,
            StoreError::Duplicate { .. }
            | StoreError::Mongo(_)
            | StoreError::Bson(_) => ErrorKind::Unclassified,
        }
    }
}

/// Serialize into a JSON object.
pub(crate) fn to_object<T: Serialize>(
    collection: &'static str,
    value: &T,
) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Decode {
            collection,
            reason: format!("expected an object, got {}", other),
        }),
        Err(e) => Err(StoreError::Decode {
            collection,
            reason: e.to_string(),
        }),
    }
}

/// The persisted form of an entity: no annotations, no expanded relations.
pub(crate) fn to_storable<E: Entity>(entity: &E) -> Result<Map<String, Value>, StoreError> {
    let mut object = to_object(E::COLLECTION, entity)?;
    object.remove("annotations");
    for relation in E::relations() {
        object.remove(relation.name);
    }
    Ok(object)
}

pub(crate) fn from_object<E: Entity>(object: Map<String, Value>) -> Result<E, StoreError> {
    serde_json::from_value(Value::Object(object)).map_err(|e| StoreError::Decode {
        collection: E::COLLECTION,
        reason: e.to_string(),
    })
}

/// Options shared by the list operations.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub sort: Option<String>,
    pub expand: Vec<String>,
    pub annotations: Vec<Count>,
    pub restrict: Option<(String, Vec<Value>)>,
    pub distinct: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn expand(mut self, relation: impl Into<String>) -> Self {
        self.expand.push(relation.into());
        self
    }

    pub fn annotate(mut self, count: Count) -> Self {
        self.annotations.push(count);
        self
    }

    /// Keep only entities whose `field` holds one of `ids`.
    pub fn restrict_to<I, V>(mut self, field: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.restrict = Some((field.into(), ids.into_iter().map(Into::into).collect()));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// Input row for [`Repository::bulk_create`].
#[derive(Debug, Clone)]
pub enum BulkItem<E> {
    Fields(Fields),
    Entity(E),
}

/// What [`Repository::update`] applies to.
#[derive(Debug, Clone)]
pub enum Target<E> {
    Id(Uuid),
    Entity(E),
}

pub struct Repository<E: Entity> {
    store: Arc<dyn Store<E>>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<dyn Store<E>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn Store<E> {
        self.store.as_ref()
    }

    fn query(&self, filter: Filter, options: &QueryOptions) -> Result<Query, StoreError> {
        if let Some(missing) = options.expand.iter().find(|name| E::relation(name).is_none()) {
            return Err(StoreError::InvalidValue(format!(
                "{} has no relation {}",
                E::COLLECTION,
                missing
            )));
        }

        let filter = match &options.restrict {
            Some((field, ids)) => filter.is_in(field.as_str(), ids.iter().cloned()),
            None => filter,
        };

        Ok(Query {
            filter,
            sort: options.sort.as_deref().map(Sort::parse).unwrap_or_default(),
            skip: 0,
            limit: None,
            expand: options.expand.clone(),
            annotations: options.annotations.clone(),
        })
    }

    /// Build an entity from assignments, rejecting fields the entity lacks.
    fn build(&self, fields: Fields) -> Result<E, StoreError> {
        let mut object = to_object(E::COLLECTION, &Record::new())?;
        let assigned: Vec<String> = fields.keys().cloned().collect();
        for (key, value) in fields {
            if key == "annotations" {
                return Err(StoreError::InvalidValue(
                    "annotations cannot be assigned".to_string(),
                ));
            }
            object.insert(key, value);
        }

        let entity: E = from_object(object)?;
        let stored = to_object(E::COLLECTION, &entity)?;
        if let Some(field) = assigned.into_iter().find(|k| !stored.contains_key(k)) {
            return Err(StoreError::UnknownField {
                collection: E::COLLECTION,
                field,
            });
        }
        Ok(entity)
    }

    pub async fn exists(&self, filter: Filter) -> Result<bool, StoreError> {
        Ok(self.store.count(&filter).await? > 0)
    }

    pub async fn create(&self, fields: Fields) -> Result<E, StoreError> {
        let entity = self.build(fields)?;
        self.store.insert(&entity).await?;
        tracing::debug!(collection = E::COLLECTION, id = %entity.id(), "Created");
        Ok(entity)
    }

    /// Load the entity matching every field in `fields`, creating it from
    /// the same fields when none exists. The flag is `true` on creation.
    pub async fn get_or_create(&self, fields: Fields) -> Result<(E, bool), StoreError> {
        if let Some(existing) = self.get_or_none(Filter::from_fields(&fields)).await? {
            return Ok((existing, false));
        }
        Ok((self.create(fields).await?, true))
    }

    pub async fn get_or_none(&self, filter: Filter) -> Result<Option<E>, StoreError> {
        self.first(filter, &QueryOptions::default()).await
    }

    /// Load by id regardless of soft-delete state.
    pub async fn get_by_id(&self, id: Uuid, options: &QueryOptions) -> Result<Option<E>, StoreError> {
        let mut query = self.query(Filter::id(id), options)?;
        query.limit = Some(1);
        Ok(self.store.find(&query).await?.into_iter().next())
    }

    pub async fn all(&self, filter: Filter, options: &QueryOptions) -> Result<Vec<E>, StoreError> {
        let query = self.query(filter, options)?;
        let entities = self.store.find(&query).await?;
        Ok(if options.distinct {
            dedupe(entities)
        } else {
            entities
        })
    }

    pub async fn all_ids(&self, filter: Filter, options: &QueryOptions) -> Result<Vec<Uuid>, StoreError> {
        let entities = self.all(filter, options).await?;
        Ok(entities.iter().map(Entity::id).collect())
    }

    /// One page of matches plus pagination metadata. `total` counts every
    /// match, not just the page.
    pub async fn filter(
        &self,
        filter: Filter,
        page: u64,
        page_size: u64,
        options: &QueryOptions,
    ) -> Result<(Vec<E>, Meta), StoreError> {
        if page < 1 {
            return Err(StoreError::InvalidValue("page must be >= 1".to_string()));
        }
        if page_size < 1 {
            return Err(StoreError::InvalidValue("page_size must be >= 1".to_string()));
        }

        let skip = (page - 1)
            .checked_mul(page_size)
            .filter(|skip| i64::try_from(*skip).is_ok() && i64::try_from(page_size).is_ok())
            .ok_or_else(|| {
                StoreError::InvalidValue(format!(
                    "page {} with page_size {} is out of range",
                    page, page_size
                ))
            })?;

        let mut query = self.query(filter, options)?;
        let total = self.store.count(&query.filter).await?;
        query.skip = skip;
        query.limit = Some(page_size);

        let entities = self.store.find(&query).await?;
        let entities = if options.distinct {
            dedupe(entities)
        } else {
            entities
        };
        Ok((entities, Meta::new(page, page_size, total)))
    }

    pub async fn first(&self, filter: Filter, options: &QueryOptions) -> Result<Option<E>, StoreError> {
        let (entities, _) = self.filter(filter, 1, 1, options).await?;
        Ok(entities.into_iter().next())
    }

    /// The subset of `ids` that exist, in input order.
    pub async fn filter_existing_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::new().is_in("id", ids.iter().map(Uuid::to_string));
        let found: HashSet<Uuid> = self
            .store
            .find(&Query::new(filter))
            .await?
            .iter()
            .map(Entity::id)
            .collect();
        Ok(ids.iter().copied().filter(|id| found.contains(id)).collect())
    }

    /// Insert a batch built from assignments or from ready entities.
    ///
    /// The first item decides how the whole batch is read; mixing the two
    /// forms is rejected. Returns every entity of the batch, including rows
    /// skipped under `ignore_conflicts`.
    pub async fn bulk_create(
        &self,
        items: Vec<BulkItem<E>>,
        ignore_conflicts: bool,
    ) -> Result<Vec<E>, StoreError> {
        let from_fields = match items.first() {
            Some(BulkItem::Fields(_)) => true,
            Some(BulkItem::Entity(_)) => false,
            None => return Ok(Vec::new()),
        };

        let entities = items
            .into_iter()
            .map(|item| match (item, from_fields) {
                (BulkItem::Fields(fields), true) => self.build(fields),
                (BulkItem::Entity(entity), false) => Ok(entity),
                _ => Err(StoreError::InvalidValue(
                    "bulk_create batches cannot mix field maps and entities".to_string(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let written = self.store.insert_many(&entities, ignore_conflicts).await?;
        tracing::debug!(
            collection = E::COLLECTION,
            requested = entities.len(),
            written,
            "Bulk created"
        );
        Ok(entities)
    }

    /// Assign `fields` and persist. `None` when the target does not exist.
    pub async fn update(&self, target: Target<E>, fields: Fields) -> Result<Option<E>, StoreError> {
        let entity = match target {
            Target::Entity(entity) => entity,
            Target::Id(id) => match self.get_by_id(id, &QueryOptions::default()).await? {
                Some(entity) => entity,
                None => return Ok(None),
            },
        };

        let mut object = to_object(E::COLLECTION, &entity)?;
        for (key, value) in fields {
            if RECORD_FIELDS.contains(&key.as_str()) {
                return Err(StoreError::InvalidValue(format!("{} cannot be assigned", key)));
            }
            if !object.contains_key(&key) {
                return Err(StoreError::UnknownField {
                    collection: E::COLLECTION,
                    field: key,
                });
            }
            object.insert(key, value);
        }

        let mut updated: E = from_object(object)?;
        let record = updated.record_mut();
        record.updated_at = Utc::now();
        record.annotations.clear();

        if self.store.replace(&updated).await? {
            Ok(Some(updated))
        } else {
            Ok(None)
        }
    }

    /// Physically remove `entity`.
    pub async fn delete(&self, entity: &E) -> Result<bool, StoreError> {
        self.delete_by_id(entity.id()).await
    }

    pub async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.store.delete_many(&Filter::id(id)).await? > 0)
    }

    pub async fn delete_by_filter(&self, filter: Filter) -> Result<u64, StoreError> {
        let deleted = self.store.delete_many(&filter).await?;
        tracing::debug!(collection = E::COLLECTION, deleted, "Deleted by filter");
        Ok(deleted)
    }
}

fn dedupe<E: Entity>(entities: Vec<E>) -> Vec<E> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter(|entity| seen.insert(entity.id()))
        .collect()
}
