//! Thin async key-value cache.
//!
//! No retries or backoff; connection failures surface as [`CacheError`].

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::CacheClient;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),

    #[error("cache connection is closed")]
    Closed,

    #[error("cache lock poisoned: {0}")]
    Poisoned(String),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn ping(&self) -> Result<bool, CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value`. A `ttl` of `None` or `Some(0)` stores without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<(), CacheError>;

    /// Number of keys removed.
    async fn delete(&self, key: &str) -> Result<u64, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Set a TTL in seconds; `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl: u64) -> Result<bool, CacheError>;

    async fn version(&self) -> Result<String, CacheError>;

    /// Release the connection. Later calls fail with [`CacheError::Closed`].
    async fn close(&self) -> Result<(), CacheError>;
}
