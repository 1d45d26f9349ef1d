#![allow(dead_code)]

use agent_service::services::metrics::init_metrics;
use agent_service::services::providers::diffusion::ImageClient;
use agent_service::services::providers::mock::{MockAgent, MockPipeline};
use agent_service::startup::{AppState, Application};
use serde_json::Value;
use service_core::cache::MemoryCache;
use service_core::repository::MemoryDatabase;
use std::sync::{Arc, Once};
use tempfile::TempDir;

static METRICS: Once = Once::new();

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub db: MemoryDatabase,
    pub cache: Arc<MemoryCache>,
    pub agent: Arc<MockAgent>,
    pub pipeline: Arc<MockPipeline>,
    pub output_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockAgent::new(true), MockPipeline::new()).await
    }

    pub async fn spawn_with(agent: MockAgent, pipeline: MockPipeline) -> Self {
        METRICS.call_once(|| {
            init_metrics().expect("Failed to install metrics recorder");
        });

        let db = MemoryDatabase::new();
        let cache = Arc::new(MemoryCache::new());
        let agent = Arc::new(agent);
        let pipeline = Arc::new(pipeline);
        let output_dir = tempfile::tempdir().expect("Failed to create output dir");

        let image_client = ImageClient::new(pipeline.clone(), output_dir.path().join("image"))
            .expect("Failed to create image client");
        let state = AppState::in_memory(
            db.clone(),
            cache.clone(),
            agent.clone(),
            Arc::new(image_client),
        );

        let app = Application::with_state(state, 0)
            .await
            .expect("Failed to build test application");
        let port = app.http_port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health/check", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            db,
            cache,
            agent,
            pipeline,
            output_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Parse a response body as JSON.
pub async fn json(response: reqwest::Response) -> Value {
    response.json().await.expect("Response body is not JSON")
}
