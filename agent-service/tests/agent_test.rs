mod common;

use agent_service::services::providers::mock::{MockAgent, MockPipeline};
use common::{json, TestApp};
use serde_json::json;

#[tokio::test]
async fn run_returns_agent_output() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/agent/run", &json!({ "prompt": "Name a prime." }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body = json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["output"], "Mock response for: Name a prime.");
    assert_eq!(app.agent.prompts(), vec!["Name a prime.".to_string()]);
}

#[tokio::test]
async fn runs_are_listed_with_pagination_meta() {
    let app = TestApp::spawn().await;
    for i in 0..3 {
        app.post_json("/agent/run", &json!({ "prompt": format!("q{}", i) }))
            .await;
    }

    let body = json(app.get("/agent/runs?page=1&page_size=2&sort=prompt").await).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["prompt"], "q0");
    assert_eq!(
        body["meta"],
        json!({ "page": 1, "page_size": 2, "total": 3, "total_pages": 2 })
    );
    assert_eq!(app.db.documents("agent_runs").await.len(), 3);
}

#[tokio::test]
async fn empty_prompt_is_a_validation_error() {
    let app = TestApp::spawn().await;

    let response = app.post_json("/agent/run", &json!({ "prompt": "" })).await;
    assert_eq!(response.status().as_u16(), 422);

    let body = json(response).await;
    assert_eq!(body["type"], "validation_error");
    assert_eq!(body["message"], "prompt: must not be empty");
    assert_eq!(body["details"][0]["violations"][0]["field"], "prompt");
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/agent/run"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(json(response).await["type"], "validation_error");
}

#[tokio::test]
async fn bad_page_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.get("/agent/runs?page=0").await;
    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(json(response).await["message"], "page: must be at least 1");
}

#[tokio::test]
async fn huge_page_returns_an_error_envelope() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/agent/runs?page=18446744073709551615&page_size=10")
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let body = json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["type"], "invalid_request");
    assert!(body["message"].as_str().unwrap().contains("out of range"));
}

#[tokio::test]
async fn runtime_failure_maps_to_bad_gateway() {
    let app = TestApp::spawn_with(MockAgent::new(false), MockPipeline::new()).await;

    let response = app.post_json("/agent/run", &json!({ "prompt": "hi" })).await;
    assert_eq!(response.status().as_u16(), 502);

    let body = json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["type"], "external_api_error");
    assert!(app.db.documents("agent_runs").await.is_empty());
}
