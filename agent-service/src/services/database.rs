//! MongoDB connection for agent-service.
//!
//! Owns the client, builds the repositories' stores and reports health for
//! `/health/check`.

use super::health::DatabaseProbe;
use crate::models::{AgentRun, ImageGeneration};
use async_trait::async_trait;
use mongodb::{bson::doc, Client as MongoClient, Database};
use service_core::error::AppError;
use service_core::repository::{MemoryDatabase, MongoStore, StoreError};

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

fn database_error(e: mongodb::error::Error) -> AppError {
    AppError::Database(StoreError::Mongo(e))
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            database_error(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn agent_runs(&self) -> MongoStore<AgentRun> {
        MongoStore::new(&self.db)
    }

    pub fn image_generations(&self) -> MongoStore<ImageGeneration> {
        MongoStore::new(&self.db)
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for agent-service");
        self.agent_runs().ensure_indexes().await?;
        self.image_generations().ensure_indexes().await?;
        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                database_error(e)
            })?;
        Ok(())
    }

    /// Server version reported by `buildInfo`.
    pub async fn server_version(&self) -> Result<String, AppError> {
        let info = self
            .client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 }, None)
            .await
            .map_err(database_error)?;
        info.get_str("version").map(str::to_string).map_err(|e| {
            AppError::Database(StoreError::Decode {
                collection: "admin",
                reason: e.to_string(),
            })
        })
    }
}

#[async_trait]
impl DatabaseProbe for MongoDb {
    async fn ping(&self) -> bool {
        self.health_check().await.is_ok()
    }

    async fn version(&self) -> Option<String> {
        self.server_version()
            .await
            .map_err(|e| tracing::warn!(error = %e, "MongoDB version unavailable"))
            .ok()
    }
}

/// The in-process database used by tests and local runs without MongoDB.
#[async_trait]
impl DatabaseProbe for MemoryDatabase {
    async fn ping(&self) -> bool {
        true
    }

    async fn version(&self) -> Option<String> {
        Some("memory".to_string())
    }
}
