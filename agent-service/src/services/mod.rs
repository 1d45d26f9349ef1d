pub mod agent;
pub mod database;
pub mod health;
pub mod image;
pub mod metrics;
pub mod providers;

pub use agent::AgentService;
pub use database::MongoDb;
pub use health::{DatabaseProbe, HealthService};
pub use image::ImageService;
pub use providers::{AgentRuntime, ImagePipeline, ProviderError};
