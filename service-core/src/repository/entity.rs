use super::query::Filter;
use super::store::Store;
use super::StoreError;
use crate::format::{timestamp, uuid_string};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identity, timestamps and soft-delete marker shared by every entity.
///
/// Entities embed it with `#[serde(flatten)]`. `deleted_at == None` means the
/// entity is active. `annotations` holds computed counts from the last load
/// and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(with = "uuid_string")]
    pub id: Uuid,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, i64>,
}

impl Record {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            annotations: BTreeMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn annotation(&self, name: &str) -> Option<i64> {
        self.annotations.get(name).copied()
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

/// Fields of [`Record`] that callers may not assign through updates.
pub const RECORD_FIELDS: &[&str] = &["id", "created_at", "updated_at", "annotations"];

/// A one-to-many link from this entity to documents of another collection.
/// Expanded relations are embedded under `name` as an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub collection: &'static str,
    pub local_field: &'static str,
    pub foreign_field: &'static str,
}

pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    const COLLECTION: &'static str;

    /// Fields whose values must be unique across the collection.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    fn relations() -> &'static [Relation] {
        &[]
    }

    fn relation(name: &str) -> Option<&'static Relation> {
        Self::relations().iter().find(|r| r.name == name)
    }

    fn record(&self) -> &Record;

    fn record_mut(&mut self) -> &mut Record;

    fn id(&self) -> Uuid {
        self.record().id
    }

    /// Filter selecting entities that have not been soft deleted.
    fn get_active() -> Filter {
        Filter::new().is_null("deleted_at", true)
    }
}

/// Marking an entity deleted without removing it.
#[async_trait]
pub trait SoftDelete: Entity {
    async fn soft_delete(&mut self, store: &dyn Store<Self>) -> Result<(), StoreError> {
        let now = Utc::now();
        let record = self.record_mut();
        record.deleted_at = Some(now);
        record.updated_at = now;
        record.annotations.clear();
        if !store.replace(self).await? {
            return Err(StoreError::NotFound {
                collection: Self::COLLECTION,
                id: self.id(),
            });
        }
        tracing::debug!(collection = Self::COLLECTION, id = %self.id(), "Soft deleted");
        Ok(())
    }
}

impl<E: Entity> SoftDelete for E {}
