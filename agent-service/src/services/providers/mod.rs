//! Clients for the model backends.
//!
//! [`AgentRuntime`] answers chat prompts; [`ImagePipeline`] renders images
//! and is blocking, so callers go through [`diffusion::ImageClient`], which
//! moves the work off the async scheduler.

pub mod agent;
pub mod diffusion;
pub mod mock;

use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider returned no output")]
    EmptyResponse,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidRequest(msg) => AppError::InvalidValue(msg),
            ProviderError::Io(e) => AppError::Io(e),
            ProviderError::NotConfigured(_) | ProviderError::Worker(_) => {
                AppError::Internal(anyhow::Error::new(err))
            }
            other => AppError::Upstream(other.to_string()),
        }
    }
}

/// Chat agent answering a single prompt.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Model identifier recorded with each run.
    fn model(&self) -> &str;
}

/// What to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
}

/// Progress hook, called with the zero based index of the finished step and
/// the total step count.
pub type StepCallback<'a> = &'a (dyn Fn(u32, u32) + Send + Sync);

/// Blocking text-to-image renderer returning encoded PNG bytes.
///
/// Implementations are shared across requests and must tolerate concurrent
/// calls.
pub trait ImagePipeline: Send + Sync {
    fn generate(&self, spec: &ImageSpec, on_step: StepCallback<'_>) -> Result<Vec<u8>, ProviderError>;
}
