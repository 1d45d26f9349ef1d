//! Text-to-image generation.
//!
//! [`RemoteDiffusionPipeline`] talks to a Stable Diffusion web API
//! (`/sdapi/v1/txt2img`). [`ImageClient`] runs any [`ImagePipeline`] on the
//! blocking pool and stores the result as `<output_dir>/<uuid>.png`.

use super::{ImagePipeline, ImageSpec, ProviderError};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use service_core::serialize::HttpUrl;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct RemoteDiffusionPipeline {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl RemoteDiffusionPipeline {
    pub fn new(api_url: &HttpUrl) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/sdapi/v1/txt2img", api_url.as_str().trim_end_matches('/')),
        })
    }
}

#[derive(Debug, Serialize)]
struct Txt2ImgRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    steps: u32,
    width: u32,
    height: u32,
    batch_size: u32,
}

#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

impl ImagePipeline for RemoteDiffusionPipeline {
    /// The remote API does not stream progress, so every step is reported
    /// once the render has finished.
    fn generate(
        &self,
        spec: &ImageSpec,
        on_step: super::StepCallback<'_>,
    ) -> Result<Vec<u8>, ProviderError> {
        let body = Txt2ImgRequest {
            prompt: &spec.prompt,
            negative_prompt: &spec.negative_prompt,
            steps: spec.steps,
            width: spec.width,
            height: spec.height,
            batch_size: 1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(ProviderError::ApiError(format!(
                "txt2img failed {}: {}",
                status, error_text
            )));
        }

        let parsed: Txt2ImgResponse = response
            .json()
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;
        let encoded = parsed
            .images
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        let png = decode_image(&encoded)?;
        for step in 0..spec.steps {
            on_step(step, spec.steps);
        }
        Ok(png)
    }
}

/// Decode a base64 image, tolerating a `data:image/png;base64,` prefix.
fn decode_image(encoded: &str) -> Result<Vec<u8>, ProviderError> {
    let payload = encoded
        .split_once(',')
        .filter(|(prefix, _)| prefix.starts_with("data:"))
        .map_or(encoded, |(_, data)| data);
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ProviderError::ApiError(format!("invalid image payload: {}", e)))
}

/// Log a finished step as `Step i/n (pct%)`.
pub fn log_step(step_index: u32, total_steps: u32) {
    let total = total_steps.max(1);
    let current = (step_index + 1).min(total);
    let pct = f64::from(current) / f64::from(total) * 100.0;
    tracing::info!(client = "ImageClient", "Step {}/{} ({:.1}%)", current, total, pct);
}

/// Runs a pipeline off the async scheduler and persists its output.
pub struct ImageClient {
    pipeline: Arc<dyn ImagePipeline>,
    output_dir: PathBuf,
}

impl ImageClient {
    /// Creates `output_dir` if needed.
    pub fn new(
        pipeline: Arc<dyn ImagePipeline>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ProviderError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            pipeline,
            output_dir,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render `prompt` and return the path of the written PNG.
    pub async fn run(
        &self,
        prompt: &str,
        steps: u32,
        width: u32,
        height: u32,
    ) -> Result<String, ProviderError> {
        tracing::debug!(client = "ImageClient", %prompt, steps, width, height, "Generating image");

        let spec = ImageSpec {
            prompt: prompt.to_string(),
            negative_prompt: String::new(),
            steps,
            width,
            height,
        };
        let pipeline = Arc::clone(&self.pipeline);
        let file_path = self.output_dir.join(format!("{}.png", Uuid::new_v4()));

        tokio::task::spawn_blocking(move || -> Result<String, ProviderError> {
            let png = pipeline.generate(&spec, &log_step)?;
            std::fs::write(&file_path, png)?;
            Ok(file_path.to_string_lossy().into_owned())
        })
        .await
        .map_err(|e| ProviderError::Worker(e.to_string()))?
    }
}
