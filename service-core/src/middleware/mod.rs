pub mod metrics;
pub mod process_time;
pub mod request_id;
pub mod security_headers;

pub use metrics::metrics_middleware;
pub use process_time::{process_time_middleware, PROCESS_TIME_HEADER};
pub use request_id::{make_request_span, request_id_middleware, REQUEST_ID_HEADER};
pub use security_headers::security_headers_middleware;
