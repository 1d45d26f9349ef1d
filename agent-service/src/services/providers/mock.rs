//! Mock provider implementations for testing.

use super::{AgentRuntime, ImagePipeline, ImageSpec, ProviderError, StepCallback};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Smallest byte sequence recognisable as a PNG.
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Agent that answers `Mock response for: <prompt>` and remembers prompts.
pub struct MockAgent {
    enabled: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockAgent {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AgentRuntime for MockAgent {
    async fn run(&self, prompt: &str) -> Result<String, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::ApiError("mock agent unavailable".to_string()));
        }
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(format!("Mock response for: {}", prompt))
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

/// Pipeline that reports every step and returns a PNG signature.
pub struct MockPipeline {
    fail: bool,
    steps: AtomicU32,
}

impl MockPipeline {
    pub fn new() -> Self {
        Self {
            fail: false,
            steps: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            steps: AtomicU32::new(0),
        }
    }

    /// Total steps reported through the callback so far.
    pub fn steps_reported(&self) -> u32 {
        self.steps.load(Ordering::SeqCst)
    }
}

impl Default for MockPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePipeline for MockPipeline {
    fn generate(&self, spec: &ImageSpec, on_step: StepCallback<'_>) -> Result<Vec<u8>, ProviderError> {
        if self.fail {
            return Err(ProviderError::ApiError("mock pipeline failure".to_string()));
        }
        for step in 0..spec.steps {
            on_step(step, spec.steps);
            self.steps.fetch_add(1, Ordering::SeqCst);
        }
        Ok(PNG_SIGNATURE.to_vec())
    }
}
