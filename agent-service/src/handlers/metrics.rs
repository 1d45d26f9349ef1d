use axum::response::IntoResponse;

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    crate::services::metrics::get_metrics()
}
