//! HTTP handlers. Every response body is a success or error envelope,
//! except `/metrics`.

pub mod agent;
pub mod health;
pub mod image;
pub mod metrics;

use service_core::envelope::ErrorResponse;
use service_core::axum::http::Uri;

/// Envelope for requests that match no route.
pub async fn not_found(uri: Uri) -> ErrorResponse {
    ErrorResponse::not_found(
        "Resource not found",
        vec![format!("No route for {}", uri.path())],
    )
}
