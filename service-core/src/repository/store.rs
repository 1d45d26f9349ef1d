use super::entity::Entity;
use super::query::{Filter, Query};
use super::StoreError;
use async_trait::async_trait;

/// Persistence backend for one entity type.
#[async_trait]
pub trait Store<E: Entity>: Send + Sync {
    async fn find(&self, query: &Query) -> Result<Vec<E>, StoreError>;

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError>;

    async fn insert(&self, entity: &E) -> Result<(), StoreError>;

    /// Insert a batch. With `ignore_conflicts`, rows violating a unique
    /// field are skipped instead of failing the call. Returns the number of
    /// rows written.
    async fn insert_many(&self, entities: &[E], ignore_conflicts: bool) -> Result<u64, StoreError>;

    /// Overwrite the stored entity with the same id. `false` when no such
    /// entity exists.
    async fn replace(&self, entity: &E) -> Result<bool, StoreError>;

    async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError>;
}
