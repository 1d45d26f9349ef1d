use crate::format::format_duration;
use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Report handler latency in a human readable `X-Process-Time` header.
pub async fn process_time_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = format_duration(start.elapsed());

    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    response
}
