use super::metrics::record_image_generation;
use super::providers::diffusion::ImageClient;
use crate::dtos::image::{ImageRequest, ImageResponse};
use crate::dtos::PageParams;
use crate::models::ImageGeneration;
use service_core::envelope::{ErrorResponse, Meta};
use service_core::error::AppError;
use service_core::fields;
use service_core::repository::{Entity, QueryOptions, Repository, SoftDelete};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

#[derive(Clone)]
pub struct ImageService {
    client: Arc<ImageClient>,
    generations: Repository<ImageGeneration>,
}

impl ImageService {
    pub fn new(client: Arc<ImageClient>, generations: Repository<ImageGeneration>) -> Self {
        Self {
            client,
            generations,
        }
    }

    pub async fn generate(&self, payload: &ImageRequest) -> Result<ImageResponse, AppError> {
        tracing::debug!(service = "ImageService", prompt = %payload.prompt, "Generate requested");
        let started = Instant::now();
        let result = self
            .client
            .run(&payload.prompt, payload.steps, payload.width, payload.height)
            .await;
        let elapsed = started.elapsed();
        record_image_generation(result.is_ok(), payload.steps, elapsed.as_secs_f64());
        let output = result?;

        let generation = self
            .generations
            .create(fields! {
                "prompt": payload.prompt,
                "steps": payload.steps,
                "width": payload.width,
                "height": payload.height,
                "output": output,
                "duration_ms": elapsed.as_millis() as u64,
            })
            .await?;
        tracing::info!(
            service = "ImageService",
            id = %generation.id(),
            output = %generation.output,
            "Image generated"
        );

        Ok(ImageResponse {
            output: generation.output,
        })
    }

    pub async fn list(&self, params: &PageParams) -> Result<(Vec<ImageGeneration>, Meta), AppError> {
        let options = QueryOptions::new().sort(params.sort_or_newest());
        Ok(self
            .generations
            .filter(ImageGeneration::get_active(), params.page, params.page_size, &options)
            .await?)
    }

    /// An active generation, or a 404 envelope.
    pub async fn get(&self, id: Uuid) -> Result<ImageGeneration, AppError> {
        match self.generations.get_by_id(id, &QueryOptions::new()).await? {
            Some(generation) if generation.record.is_active() => Ok(generation),
            _ => Err(not_found(id)),
        }
    }

    /// Soft delete; the row stays in the store with `deleted_at` set.
    pub async fn delete(&self, id: Uuid) -> Result<ImageGeneration, AppError> {
        let mut generation = self.get(id).await?;
        generation.soft_delete(self.generations.store()).await?;
        tracing::info!(service = "ImageService", %id, "Image generation deleted");
        Ok(generation)
    }
}

fn not_found(id: Uuid) -> AppError {
    ErrorResponse::not_found(
        "Image generation not found",
        vec![format!("No image generation with id {}", id)],
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockPipeline;
    use service_core::repository::MemoryStore;

    fn service(dir: &std::path::Path) -> ImageService {
        let client = ImageClient::new(Arc::new(MockPipeline::new()), dir).unwrap();
        let generations = Repository::new(Arc::new(MemoryStore::<ImageGeneration>::standalone()));
        ImageService::new(Arc::new(client), generations)
    }

    fn request(prompt: &str) -> ImageRequest {
        ImageRequest {
            prompt: prompt.to_string(),
            steps: 3,
            width: 64,
            height: 64,
        }
    }

    #[tokio::test]
    async fn generate_records_the_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let response = service.generate(&request("a red fox")).await.unwrap();
        assert!(std::path::Path::new(&response.output).exists());

        let (items, meta) = service.list(&PageParams::default()).await.unwrap();
        assert_eq!(meta.total, 1);
        assert_eq!(items[0].output, response.output);
        assert_eq!(items[0].steps, 3);
    }

    #[tokio::test]
    async fn deleted_generation_disappears() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        service.generate(&request("a")).await.unwrap();
        let (items, _) = service.list(&PageParams::default()).await.unwrap();
        let id = items[0].id();

        let deleted = service.delete(id).await.unwrap();
        assert!(deleted.record.deleted_at.is_some());

        assert!(service.list(&PageParams::default()).await.unwrap().0.is_empty());
        let err = service.get(id).await.unwrap_err();
        assert!(matches!(err, AppError::Response(ref r) if r.code.as_u16() == 404));
        assert!(service.delete(id).await.is_err());
    }
}
