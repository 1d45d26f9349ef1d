use crate::dtos::health::HealthReport;
use crate::startup::AppState;
use axum::extract::State;
use service_core::envelope::SuccessResponse;

/// GET /health/check
pub async fn check(State(state): State<AppState>) -> SuccessResponse<HealthReport> {
    SuccessResponse::ok(state.health.check_health().await)
}
