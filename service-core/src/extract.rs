use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body that has passed `validator` checks. Both malformed bodies and
/// failed checks are rejected as validation errors (422).
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Query string counterpart of [`ValidatedJson`].
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Router,
    };
    use serde::Deserialize;
    use serde_json::Value;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Validate)]
    struct Prompt {
        #[validate(length(min = 1, message = "must not be empty"))]
        prompt: String,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Page {
        #[validate(range(min = 1, message = "must be at least 1"))]
        page: u64,
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/echo",
                post(|ValidatedJson(body): ValidatedJson<Prompt>| async move { body.prompt }),
            )
            .route(
                "/page",
                get(|ValidatedQuery(q): ValidatedQuery<Page>| async move {
                    q.page.to_string().into_response()
                }),
            )
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn failed_checks_become_validation_envelopes() {
        let response = app()
            .oneshot(
                HttpRequest::post("/echo")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt":""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["type"], "validation_error");
        assert_eq!(body["message"], "prompt: must not be empty");
    }

    #[tokio::test]
    async fn malformed_query_is_a_validation_error() {
        let response = app()
            .oneshot(HttpRequest::get("/page?page=abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app()
            .oneshot(HttpRequest::get("/page?page=0").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["message"], "page: must be at least 1");
    }
}
