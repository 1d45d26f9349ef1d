use crate::dtos::health::{ComponentHealth, HealthReport};
use async_trait::async_trait;
use service_core::cache::CacheStore;
use service_core::envelope::Status;
use std::sync::Arc;

/// Reachability and version of the backing database.
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    async fn ping(&self) -> bool;

    async fn version(&self) -> Option<String>;
}

#[derive(Clone)]
pub struct HealthService {
    db: Arc<dyn DatabaseProbe>,
    cache: Arc<dyn CacheStore>,
}

fn status(up: bool) -> Status {
    if up {
        Status::Success
    } else {
        Status::Error
    }
}

impl HealthService {
    pub fn new(db: Arc<dyn DatabaseProbe>, cache: Arc<dyn CacheStore>) -> Self {
        Self { db, cache }
    }

    /// Never fails: an unreachable dependency is reported, not raised.
    pub async fn check_health(&self) -> HealthReport {
        let (db_up, db_version) = tokio::join!(self.db.ping(), self.db.version());
        let (cache_up, cache_version) = tokio::join!(self.cache.ping(), self.cache.version());

        let report = HealthReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            db: ComponentHealth {
                status: status(db_up),
                version: db_version,
            },
            cache: ComponentHealth {
                status: status(matches!(cache_up, Ok(true))),
                version: cache_version.ok(),
            },
        };

        tracing::info!(
            service = "HealthService",
            db = ?report.db.status,
            cache = ?report.cache.status,
            "Health checked"
        );
        report
    }
}
