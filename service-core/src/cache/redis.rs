use super::{CacheError, CacheStore};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use tokio::sync::RwLock;

/// Redis backed cache over a shared [`ConnectionManager`].
pub struct CacheClient {
    manager: RwLock<Option<ConnectionManager>>,
}

impl CacheClient {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        tracing::info!("Connecting to cache");
        let client = Client::open(url)?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            e
        })?;

        tracing::info!("Successfully connected to cache");
        Ok(Self {
            manager: RwLock::new(Some(manager)),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        self.manager.read().await.clone().ok_or(CacheError::Closed)
    }
}

fn parse_version(info: &str) -> Option<String> {
    info.lines()
        .find_map(|line| line.trim().strip_prefix("redis_version:"))
        .map(str::to_string)
}

#[async_trait]
impl CacheStore for CacheClient {
    async fn ping(&self) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(reply == "PONG")
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(redis::cmd("GET").arg(key).query_async(&mut conn).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(seconds) if seconds > 0 => {
                redis::cmd("SETEX")
                    .arg(key)
                    .arg(seconds)
                    .arg(value)
                    .query_async::<_, ()>(&mut conn)
                    .await?
            }
            _ => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query_async::<_, ()>(&mut conn)
                    .await?
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;
        Ok(redis::cmd("DEL").arg(key).query_async(&mut conn).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let count: u64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }

    async fn expire(&self, key: &str, ttl: u64) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        Ok(redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl)
            .query_async(&mut conn)
            .await?)
    }

    async fn version(&self) -> Result<String, CacheError> {
        let mut conn = self.connection().await?;
        let info: String = redis::cmd("INFO").arg("server").query_async(&mut conn).await?;
        Ok(parse_version(&info).unwrap_or_else(|| "unknown".to_string()))
    }

    async fn close(&self) -> Result<(), CacheError> {
        if self.manager.write().await.take().is_some() {
            tracing::info!("Cache connection closed");
        }
        Ok(())
    }
}
