//! Application startup and lifecycle management.
//!
//! Process-wide clients (database, cache, agent runtime, image pipeline)
//! are created once through the singleton registry and handed to the
//! services explicitly.

use crate::config::AgentConfig;
use crate::handlers;
use crate::models::{AgentRun, ImageGeneration};
use crate::services::providers::agent::ChatAgent;
use crate::services::providers::diffusion::{ImageClient, RemoteDiffusionPipeline};
use crate::services::{AgentRuntime, AgentService, HealthService, ImageService, MongoDb};
use axum::{
    body::Body,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::cache::{CacheClient, CacheStore};
use service_core::error::AppError;
use service_core::middleware::{
    make_request_span, metrics_middleware, process_time_middleware, request_id_middleware,
    security_headers_middleware,
};
use service_core::repository::{MemoryDatabase, MemoryStore, Repository};
use service_core::singleton;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub health: HealthService,
    pub agent: AgentService,
    pub image: ImageService,
    pub cache: Arc<dyn CacheStore>,
}

impl AppState {
    /// Connect every backing service named in `config`.
    pub async fn from_config(config: &AgentConfig) -> Result<Self, AppError> {
        let registry = singleton::global();

        let db = registry
            .get_or_try_init(|| MongoDb::connect(&config.mongodb.uri, &config.mongodb.database))
            .await?;
        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let cache_url = config.cache_url()?;
        let cache = registry
            .get_or_try_init(|| async { CacheClient::connect(cache_url.as_str()).await })
            .await?;

        let agent = registry
            .get_or_try_init(|| async { ChatAgent::new(&config.agent) })
            .await?;
        tracing::info!(model = %config.agent.model, base_url = %config.agent.base_url, "Initialized agent runtime");

        let image_client = registry
            .get_or_try_init(|| async {
                let pipeline = RemoteDiffusionPipeline::new(&config.image.api_url)?;
                ImageClient::new(Arc::new(pipeline), &config.image.output_dir)
            })
            .await?;
        tracing::info!(endpoint = %config.image.api_url, "Initialized image pipeline");

        let runtime: Arc<dyn AgentRuntime> = agent;
        let cache: Arc<dyn CacheStore> = cache;
        Ok(Self {
            health: HealthService::new(db.clone(), Arc::clone(&cache)),
            agent: AgentService::new(runtime, Repository::new(Arc::new(db.agent_runs()))),
            image: ImageService::new(
                image_client,
                Repository::new(Arc::new(db.image_generations())),
            ),
            cache,
        })
    }

    /// State backed by an in-process database, for tests and offline runs.
    pub fn in_memory(
        db: MemoryDatabase,
        cache: Arc<dyn CacheStore>,
        runtime: Arc<dyn AgentRuntime>,
        image_client: Arc<ImageClient>,
    ) -> Self {
        Self {
            health: HealthService::new(Arc::new(db.clone()), Arc::clone(&cache)),
            agent: AgentService::new(
                runtime,
                Repository::new(Arc::new(MemoryStore::<AgentRun>::new(db.clone()))),
            ),
            image: ImageService::new(
                image_client,
                Repository::new(Arc::new(MemoryStore::<ImageGeneration>::new(db))),
            ),
            cache,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health/check", get(handlers::health::check))
        .route("/agent/run", post(handlers::agent::run))
        .route("/agent/runs", get(handlers::agent::list_runs))
        .route("/image/generate", post(handlers::image::generate))
        .route("/image/generations", get(handlers::image::list_generations))
        .route(
            "/image/generations/:id",
            get(handlers::image::get_generation).delete(handlers::image::delete_generation),
        )
        .route("/metrics", get(handlers::metrics::metrics))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(process_time_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AgentConfig) -> Result<Self, AppError> {
        let state = AppState::from_config(&config).await?;
        Self::with_state(state, config.common.port).await
    }

    /// Bind `port` (0 picks a free one) and serve `state`.
    pub async fn with_state(state: AppState, port: u16) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let http_port = listener.local_addr()?.port();
        tracing::info!("Agent service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, build_router(self.state)).await
    }

    /// Run until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, build_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
    }
}
