mod common;

use agent_service::services::providers::mock::{MockAgent, MockPipeline};
use common::{json, TestApp};
use serde_json::json;
use std::path::Path;

#[tokio::test]
async fn generate_writes_png_with_defaults() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/image/generate", &json!({ "prompt": "a lighthouse at dusk" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body = json(response).await;
    let output = body["data"]["output"].as_str().unwrap().to_string();
    assert!(output.ends_with(".png"));
    assert!(Path::new(&output).starts_with(app.output_dir.path()));
    assert!(Path::new(&output).exists());
    assert_eq!(app.pipeline.steps_reported(), 10);

    let stored = app.db.documents("image_generations").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["width"], 256);
    assert_eq!(stored[0]["height"], 256);
    assert_eq!(stored[0]["steps"], 10);
}

#[tokio::test]
async fn generation_can_be_fetched_listed_and_deleted() {
    let app = TestApp::spawn().await;
    app.post_json(
        "/image/generate",
        &json!({ "prompt": "a fox", "steps": 2, "width": 64, "height": 64 }),
    )
    .await;

    let listed = json(app.get("/image/generations").await).await;
    assert_eq!(listed["meta"]["total"], 1);
    let id = listed["data"][0]["id"].as_str().unwrap().to_string();

    let fetched = json(app.get(&format!("/image/generations/{}", id)).await).await;
    assert_eq!(fetched["data"]["prompt"], "a fox");
    assert_eq!(fetched["data"]["steps"], 2);

    let deleted = app.delete(&format!("/image/generations/{}", id)).await;
    assert_eq!(deleted.status().as_u16(), 200);
    let deleted = json(deleted).await;
    assert_eq!(deleted["message"], "Image generation deleted");
    assert!(deleted["data"]["deleted_at"].is_string());

    let missing = app.get(&format!("/image/generations/{}", id)).await;
    assert_eq!(missing.status().as_u16(), 404);
    assert_eq!(json(missing).await["type"], "not_found");

    let listed = json(app.get("/image/generations").await).await;
    assert_eq!(listed["meta"]["total"], 0);
    assert_eq!(app.db.documents("image_generations").await.len(), 1);
}

#[tokio::test]
async fn unknown_or_malformed_id_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .delete("/image/generations/00000000-0000-0000-0000-000000000000")
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.get("/image/generations/not-a-uuid").await;
    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(json(response).await["type"], "validation_error");
}

#[tokio::test]
async fn invalid_dimensions_fail_validation() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/image/generate", &json!({ "prompt": "x", "width": 1 }))
        .await;
    assert_eq!(response.status().as_u16(), 422);
    let body = json(response).await;
    assert!(body["message"].as_str().unwrap().starts_with("width:"));
    assert_eq!(app.pipeline.steps_reported(), 0);
}

#[tokio::test]
async fn pipeline_failure_maps_to_bad_gateway() {
    let app = TestApp::spawn_with(MockAgent::new(true), MockPipeline::failing()).await;

    let response = app
        .post_json("/image/generate", &json!({ "prompt": "x" }))
        .await;
    assert_eq!(response.status().as_u16(), 502);
    assert!(app.db.documents("image_generations").await.is_empty());
}
