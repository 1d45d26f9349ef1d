//! In-process store evaluating queries over serialized entities.
//!
//! Collections live in a shared [`MemoryDatabase`] so that relations can be
//! expanded across stores of different entity types.

use super::entity::Entity;
use super::query::{lookup, Filter, Query};
use super::store::Store;
use super::{from_object, to_storable, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;

type Document = Map<String, Value>;

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw documents of a collection, in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

pub struct MemoryStore<E> {
    db: MemoryDatabase,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> MemoryStore<E> {
    pub fn new(db: MemoryDatabase) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    /// A store backed by its own private database.
    pub fn standalone() -> Self {
        Self::new(MemoryDatabase::new())
    }

    fn unique_fields() -> impl Iterator<Item = &'static str> {
        std::iter::once("id").chain(E::UNIQUE_FIELDS.iter().copied())
    }

    /// First unique field of `document` already taken in `existing`.
    fn conflict<'a>(
        existing: impl Iterator<Item = &'a Document> + Clone,
        document: &Document,
    ) -> Option<&'static str> {
        Self::unique_fields().find(|field| match lookup(document, field) {
            Some(value) if !value.is_null() => {
                let probe = Filter::new().eq(*field, value.clone());
                existing.clone().any(|other| probe.matches(other))
            }
            _ => false,
        })
    }

    fn duplicate(field: &str) -> StoreError {
        StoreError::Duplicate {
            collection: E::COLLECTION,
            field: field.to_string(),
        }
    }

    fn related(
        collections: &HashMap<String, Vec<Document>>,
        document: &Document,
        relation: &super::Relation,
    ) -> Vec<Value> {
        let local = lookup(document, relation.local_field)
            .cloned()
            .unwrap_or(Value::Null);
        let probe = Filter::new().eq(relation.foreign_field, local);
        collections
            .get(relation.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| probe.matches(d))
                    .cloned()
                    .map(Value::Object)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn load(
        collections: &HashMap<String, Vec<Document>>,
        query: &Query,
        document: &Document,
    ) -> Result<E, StoreError> {
        let mut loaded = document.clone();

        for name in &query.expand {
            let relation = E::relation(name).ok_or_else(|| {
                StoreError::InvalidValue(format!("{} has no relation {}", E::COLLECTION, name))
            })?;
            loaded.insert(
                name.clone(),
                Value::Array(Self::related(collections, document, relation)),
            );
        }

        if !query.annotations.is_empty() {
            let mut counts = Map::new();
            for count in &query.annotations {
                let size = match E::relation(&count.field) {
                    Some(relation) => Self::related(collections, document, relation).len(),
                    None => lookup(document, &count.field)
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len),
                };
                counts.insert(count.name.clone(), Value::from(size));
            }
            loaded.insert("annotations".to_string(), Value::Object(counts));
        }

        from_object(loaded)
    }
}

#[async_trait]
impl<E: Entity> Store<E> for MemoryStore<E> {
    async fn find(&self, query: &Query) -> Result<Vec<E>, StoreError> {
        let collections = self.db.collections.read().await;
        let documents = collections
            .get(E::COLLECTION)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut matched: Vec<&Document> = documents
            .iter()
            .filter(|d| query.filter.matches(d))
            .collect();
        if !query.sort.is_empty() {
            matched.sort_by(|a, b| query.sort.compare(a, b));
        }

        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        matched
            .into_iter()
            .skip(usize::try_from(query.skip).unwrap_or(usize::MAX))
            .take(limit)
            .map(|document| Self::load(&collections, query, document))
            .collect()
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.db.collections.read().await;
        Ok(collections
            .get(E::COLLECTION)
            .map_or(0, |docs| docs.iter().filter(|d| filter.matches(d)).count()) as u64)
    }

    async fn insert(&self, entity: &E) -> Result<(), StoreError> {
        let document = to_storable(entity)?;
        let mut collections = self.db.collections.write().await;
        let documents = collections.entry(E::COLLECTION.to_string()).or_default();
        if let Some(field) = Self::conflict(documents.iter(), &document) {
            return Err(Self::duplicate(field));
        }
        documents.push(document);
        Ok(())
    }

    async fn insert_many(&self, entities: &[E], ignore_conflicts: bool) -> Result<u64, StoreError> {
        let batch = entities
            .iter()
            .map(to_storable)
            .collect::<Result<Vec<_>, _>>()?;

        let mut collections = self.db.collections.write().await;
        let documents = collections.entry(E::COLLECTION.to_string()).or_default();

        if !ignore_conflicts {
            for (index, document) in batch.iter().enumerate() {
                let earlier = documents.iter().chain(batch[..index].iter());
                if let Some(field) = Self::conflict(earlier, document) {
                    return Err(Self::duplicate(field));
                }
            }
            let written = batch.len() as u64;
            documents.extend(batch);
            return Ok(written);
        }

        let mut written = 0;
        for document in batch {
            if let Some(field) = Self::conflict(documents.iter(), &document) {
                tracing::debug!(collection = E::COLLECTION, field, "Skipping conflicting row");
                continue;
            }
            documents.push(document);
            written += 1;
        }
        Ok(written)
    }

    async fn replace(&self, entity: &E) -> Result<bool, StoreError> {
        let document = to_storable(entity)?;
        let id = Value::String(entity.id().to_string());

        let mut collections = self.db.collections.write().await;
        let Some(documents) = collections.get_mut(E::COLLECTION) else {
            return Ok(false);
        };
        let Some(position) = documents.iter().position(|d| d.get("id") == Some(&id)) else {
            return Ok(false);
        };

        let others = documents
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, d)| d);
        if let Some(field) = Self::conflict(others, &document) {
            return Err(Self::duplicate(field));
        }

        documents[position] = document;
        Ok(true)
    }

    async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.db.collections.write().await;
        let Some(documents) = collections.get_mut(E::COLLECTION) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|d| !filter.matches(d));
        Ok((before - documents.len()) as u64)
    }
}
