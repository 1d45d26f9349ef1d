use super::{status_code, Status};
use crate::error::{Classify, FieldError};
use crate::format::utc_iso_timestamp;
use crate::serialize::to_json_safe;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Machine readable error tag carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    // generic
    ServerError,
    UnknownError,
    ServiceUnavailable,
    Timeout,
    BadGateway,
    DependencyFailure,
    GatewayTimeout,
    NotImplemented,
    // request
    BadRequest,
    InvalidRequest,
    ValidationError,
    UnprocessableEntity,
    RateLimited,
    MethodNotAllowed,
    UnsupportedMediaType,
    TooManyRequests,
    // access
    Unauthorized,
    Forbidden,
    PayloadTooLarge,
    AuthenticationError,
    AuthorizationError,
    TokenExpired,
    TokenInvalid,
    SessionExpired,
    // resources
    NotFound,
    DoesNotExist,
    Conflict,
    DuplicateEntry,
    AlreadyExists,
    InvalidState,
    PreconditionFailed,
    ResourceLocked,
    // values
    ValueError,
    TypeError,
    MissingField,
    InvalidField,
    InvalidFormat,
    UnsupportedOperation,
    // integrations
    ExternalApiError,
    ThirdPartyError,
    IntegrationFailure,
    // storage
    DbError,
    DataIntegrityError,
    UniqueConstraintViolation,
    ForeignKeyViolation,
    // files
    FileNotFound,
    FileUploadError,
    FileFormatError,
    FileTooLarge,
    // messaging
    EmailSendFailed,
    NotificationError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub field: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub fields: Option<Vec<Value>>,
    pub violations: Option<Vec<Violation>>,
}

impl ErrorDetail {
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }
}

/// Error envelope.
///
/// Serialized through [`ErrorResponse::to_dict`], which emits the fields in
/// the order `status, code, message, type, details, retry_able, timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: Status,
    #[serde(with = "status_code")]
    pub code: StatusCode,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<ErrorType>,
    pub details: Option<Vec<ErrorDetail>>,
    pub retry_able: bool,
    pub timestamp: String,
}

impl Default for ErrorResponse {
    fn default() -> Self {
        Self {
            status: Status::Error,
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
            error_type: None,
            details: None,
            retry_able: false,
            timestamp: utc_iso_timestamp(),
        }
    }
}

fn described(details: Vec<String>) -> Option<Vec<ErrorDetail>> {
    if details.is_empty() {
        None
    } else {
        Some(details.into_iter().map(ErrorDetail::described).collect())
    }
}

impl ErrorResponse {
    /// Generic constructor; `None` code and type fall back to 500/`server_error`.
    pub fn create(
        code: Option<StatusCode>,
        message: Option<String>,
        error_type: Option<ErrorType>,
    ) -> Self {
        Self {
            code: code.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message,
            error_type: Some(error_type.unwrap_or(ErrorType::ServerError)),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self {
            error_type: Some(ErrorType::ServerError),
            details: Some(vec![ErrorDetail::default()]),
            ..Self::default()
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::create(
            Some(StatusCode::BAD_REQUEST),
            Some(message.into()),
            Some(ErrorType::BadRequest),
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::create(
            Some(StatusCode::UNAUTHORIZED),
            Some(message.into()),
            Some(ErrorType::Unauthorized),
        )
    }

    pub fn not_found(message: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            details: described(details),
            ..Self::create(
                Some(StatusCode::NOT_FOUND),
                Some(message.into()),
                Some(ErrorType::NotFound),
            )
        }
    }

    pub fn conflict(message: Option<String>, details: Vec<String>) -> Self {
        let message = message.unwrap_or_else(|| "Conflict: resource already exists.".to_string());
        Self {
            details: described(details),
            ..Self::create(
                Some(StatusCode::CONFLICT),
                Some(message),
                Some(ErrorType::Conflict),
            )
        }
    }

    /// Map any classified error onto its (code, type) pair.
    pub fn process_exception<E>(error: &E) -> Self
    where
        E: Classify + fmt::Display + ?Sized,
    {
        let kind = error.kind();
        Self::create(
            Some(kind.status()),
            Some(error.to_string()),
            Some(kind.error_type()),
        )
    }

    /// Aggregate field failures into one `path.to.field: message` string.
    pub fn process_validation_error(errors: &[FieldError]) -> Self {
        let message = if errors.is_empty() {
            "Validation error".to_string()
        } else {
            errors
                .iter()
                .map(FieldError::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        };

        let details = (!errors.is_empty()).then(|| {
            vec![ErrorDetail {
                subject: Some("validation".to_string()),
                violations: Some(
                    errors
                        .iter()
                        .map(|e| Violation {
                            field: Some(e.path()),
                            description: Some(e.msg.clone()),
                        })
                        .collect(),
                ),
                ..ErrorDetail::default()
            }]
        });

        Self {
            details,
            ..Self::create(
                Some(StatusCode::UNPROCESSABLE_ENTITY),
                Some(message),
                Some(ErrorType::ValidationError),
            )
        }
    }

    pub fn with_retry_able(mut self, retry_able: bool) -> Self {
        self.retry_able = retry_able;
        self
    }

    /// The wire form of the envelope. With `exclude_none`, null top-level
    /// fields are dropped; nested details keep their nulls.
    pub fn to_dict(&self, exclude_none: bool) -> Map<String, Value> {
        let value = match to_json_safe(self) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize error envelope");
                return Map::new();
            }
        };
        let mut map = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if exclude_none {
            map.retain(|_, v| !v.is_null());
        }
        map
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error(code={}, message={}, type={:?}, retry_able={})",
            self.code.as_u16(),
            self.message.as_deref().unwrap_or("None"),
            self.error_type,
            self.retry_able
        )
    }
}

impl std::error::Error for ErrorResponse {}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.code, Json(Value::Object(self.to_dict(true)))).into_response()
    }
}
