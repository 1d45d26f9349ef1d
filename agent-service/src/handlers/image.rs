use crate::dtos::image::{ImageRequest, ImageResponse};
use crate::dtos::PageParams;
use crate::models::ImageGeneration;
use crate::startup::AppState;
use axum::extract::{rejection::PathRejection, Path, State};
use service_core::envelope::SuccessResponse;
use service_core::error::AppError;
use service_core::extract::{ValidatedJson, ValidatedQuery};
use uuid::Uuid;

/// POST /image/generate
pub async fn generate(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ImageRequest>,
) -> Result<SuccessResponse<ImageResponse>, AppError> {
    tracing::debug!(prompt = %payload.prompt, steps = payload.steps, "route|image|generate");
    let output = state.image.generate(&payload).await?;
    Ok(SuccessResponse::ok(output))
}

/// GET /image/generations
pub async fn list_generations(
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<PageParams>,
) -> Result<SuccessResponse<Vec<ImageGeneration>>, AppError> {
    let (items, meta) = state.image.list(&params).await?;
    Ok(SuccessResponse::ok(items).with_meta(meta))
}

/// GET /image/generations/:id
pub async fn get_generation(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<SuccessResponse<ImageGeneration>, AppError> {
    let Path(id) = path?;
    let generation = state.image.get(id).await?;
    Ok(SuccessResponse::ok(generation))
}

/// DELETE /image/generations/:id
pub async fn delete_generation(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<SuccessResponse<ImageGeneration>, AppError> {
    let Path(id) = path?;
    let generation = state.image.delete(id).await?;
    Ok(SuccessResponse::ok(generation).with_message("Image generation deleted"))
}
