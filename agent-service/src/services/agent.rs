use super::metrics::record_agent_run;
use super::providers::AgentRuntime;
use crate::dtos::agent::{RunRequest, RunResponse};
use crate::dtos::PageParams;
use crate::models::AgentRun;
use service_core::envelope::Meta;
use service_core::error::AppError;
use service_core::fields;
use service_core::repository::{Entity, QueryOptions, Repository};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AgentService {
    runtime: Arc<dyn AgentRuntime>,
    runs: Repository<AgentRun>,
}

impl AgentService {
    pub fn new(runtime: Arc<dyn AgentRuntime>, runs: Repository<AgentRun>) -> Self {
        Self { runtime, runs }
    }

    /// Ask the agent and record the exchange.
    pub async fn run(&self, payload: &RunRequest) -> Result<RunResponse, AppError> {
        let started = Instant::now();
        let result = self.runtime.run(&payload.prompt).await;
        let elapsed = started.elapsed();
        record_agent_run(self.runtime.model(), result.is_ok(), elapsed.as_secs_f64());
        let output = result?;

        let run = self
            .runs
            .create(fields! {
                "prompt": payload.prompt,
                "output": output,
                "model": self.runtime.model(),
                "duration_ms": elapsed.as_millis() as u64,
            })
            .await?;
        tracing::info!(service = "AgentService", id = %run.id(), "Agent run recorded");

        Ok(RunResponse { output: run.output })
    }

    /// Active runs, newest first unless `sort` says otherwise.
    pub async fn list(&self, params: &PageParams) -> Result<(Vec<AgentRun>, Meta), AppError> {
        let options = QueryOptions::new().sort(params.sort_or_newest());
        Ok(self
            .runs
            .filter(AgentRun::get_active(), params.page, params.page_size, &options)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockAgent;
    use service_core::repository::MemoryStore;

    fn service(enabled: bool) -> (AgentService, Arc<MockAgent>) {
        let agent = Arc::new(MockAgent::new(enabled));
        let runs = Repository::new(Arc::new(MemoryStore::<AgentRun>::standalone()));
        (AgentService::new(agent.clone(), runs), agent)
    }

    #[tokio::test]
    async fn run_returns_and_records_output() {
        let (service, agent) = service(true);
        let response = service
            .run(&RunRequest {
                prompt: "What is Rust?".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.output, "Mock response for: What is Rust?");
        assert_eq!(agent.prompts(), vec!["What is Rust?".to_string()]);

        let (runs, meta) = service.list(&PageParams::default()).await.unwrap();
        assert_eq!(meta.total, 1);
        assert_eq!(runs[0].model, "mock-model");
        assert_eq!(runs[0].prompt, "What is Rust?");
    }

    #[tokio::test]
    async fn runtime_failure_is_upstream_error_and_not_recorded() {
        let (service, _) = service(false);
        let err = service
            .run(&RunRequest {
                prompt: "hi".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));

        let (runs, _) = service.list(&PageParams::default()).await.unwrap();
        assert!(runs.is_empty());
    }
}
