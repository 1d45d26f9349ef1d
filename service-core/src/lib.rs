//! service-core: envelopes, errors, persistence, caching and HTTP plumbing
//! shared by the agent service.
pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod format;
pub mod middleware;
pub mod observability;
pub mod repository;
pub mod serialize;
pub mod singleton;

pub use async_trait;
pub use axum;
pub use mongodb;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tower;
pub use tower_http;
pub use tracing;
pub use validator;
