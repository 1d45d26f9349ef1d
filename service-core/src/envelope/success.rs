use super::{status_code, ErrorResponse, Status};
use crate::format::utc_iso_timestamp;
use crate::serialize::{to_json_safe, SerializationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pagination metadata for list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Meta {
    pub fn new(page: u64, page_size: u64, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

/// Success envelope. Absent `message`, `data` and `meta` are omitted.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse<T> {
    pub status: Status,
    #[serde(with = "status_code")]
    pub code: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub timestamp: String,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(code: StatusCode) -> Self {
        Self {
            status: Status::Success,
            code,
            message: None,
            data: None,
            meta: None,
            timestamp: utc_iso_timestamp(),
        }
    }

    pub fn ok(data: T) -> Self {
        Self::new(StatusCode::OK).with_data(data)
    }

    pub fn created(data: T) -> Self {
        Self::new(StatusCode::CREATED).with_data(data)
    }

    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn to_json(&self) -> Result<Value, SerializationError> {
        to_json_safe(self)
    }
}

impl<T: Serialize> IntoResponse for SuccessResponse<T> {
    fn into_response(self) -> Response {
        match self.to_json() {
            Ok(body) => (self.code, Json(body)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response payload");
                ErrorResponse::process_exception(&e).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_wraps_payload() {
        let response = SuccessResponse::ok(json!({"x": 1}));
        assert_eq!(response.code, StatusCode::OK);
        assert_eq!(response.status, Status::Success);
        assert_eq!(response.data, Some(json!({"x": 1})));

        let body = response.to_json().unwrap();
        assert_eq!(body["status"], json!("success"));
        assert_eq!(body["code"], json!(200));
        assert_eq!(body["data"], json!({"x": 1}));
        assert!(body.get("message").is_none());
        assert!(body.get("meta").is_none());
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn created_uses_201() {
        let response = SuccessResponse::created("id").with_message("stored");
        assert_eq!(response.code, StatusCode::CREATED);
        assert_eq!(response.message.as_deref(), Some("stored"));
    }

    #[test]
    fn meta_rounds_pages_up() {
        assert_eq!(Meta::new(2, 10, 25).total_pages, 3);
        assert_eq!(Meta::new(1, 10, 30).total_pages, 3);
        assert_eq!(Meta::new(1, 10, 0).total_pages, 0);
        assert_eq!(Meta::new(1, 1, 1).total_pages, 1);
    }

    #[test]
    fn meta_serializes_in_wire_shape() {
        let body = SuccessResponse::ok(Vec::<i32>::new())
            .with_meta(Meta::new(2, 10, 25))
            .to_json()
            .unwrap();
        assert_eq!(
            body["meta"],
            json!({"page": 2, "page_size": 10, "total": 25, "total_pages": 3})
        );
    }

    #[tokio::test]
    async fn response_status_follows_code() {
        let response = SuccessResponse::created(json!({"id": 1})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
