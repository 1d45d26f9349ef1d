use crate::dtos::agent::{RunRequest, RunResponse};
use crate::dtos::PageParams;
use crate::models::AgentRun;
use crate::startup::AppState;
use axum::extract::State;
use service_core::envelope::SuccessResponse;
use service_core::error::AppError;
use service_core::extract::{ValidatedJson, ValidatedQuery};

/// POST /agent/run
pub async fn run(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RunRequest>,
) -> Result<SuccessResponse<RunResponse>, AppError> {
    let output = state.agent.run(&payload).await?;
    Ok(SuccessResponse::ok(output))
}

/// GET /agent/runs
pub async fn list_runs(
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<PageParams>,
) -> Result<SuccessResponse<Vec<AgentRun>>, AppError> {
    let (runs, meta) = state.agent.list(&params).await?;
    Ok(SuccessResponse::ok(runs).with_meta(meta))
}
