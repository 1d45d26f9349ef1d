use super::{CacheError, CacheStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process cache honouring TTLs, used where no Redis is available.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    closed: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Entry>) -> T,
    ) -> Result<T, CacheError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Closed);
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Poisoned(e.to_string()))?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn ping(&self) -> Result<bool, CacheError> {
        self.with_entries(|_| true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_entries(|entries| entries.get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<(), CacheError> {
        let expires_at = ttl
            .filter(|seconds| *seconds > 0)
            .map(|seconds| Instant::now() + Duration::from_secs(seconds));
        self.with_entries(|entries| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at,
                },
            );
        })
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        self.with_entries(|entries| u64::from(entries.remove(key).is_some()))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.with_entries(|entries| entries.contains_key(key))
    }

    async fn expire(&self, key: &str, ttl: u64) -> Result<bool, CacheError> {
        self.with_entries(|entries| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl));
                true
            }
            None => false,
        })
    }

    async fn version(&self) -> Result<String, CacheError> {
        self.with_entries(|_| "memory".to_string())
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
