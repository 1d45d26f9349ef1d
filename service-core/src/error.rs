use crate::cache::CacheError;
use crate::envelope::{ErrorResponse, ErrorType};
use crate::repository::StoreError;
use crate::serialize::SerializationError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Classification of a failure, fixed where the error is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidValue,
    Lookup,
    TypeMismatch,
    FileNotFound,
    NotImplemented,
    Validation,
    Upstream,
    Unclassified,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::InvalidValue => StatusCode::BAD_REQUEST,
            ErrorKind::Lookup | ErrorKind::FileNotFound => StatusCode::NOT_FOUND,
            ErrorKind::TypeMismatch | ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Unclassified => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(self) -> ErrorType {
        match self {
            ErrorKind::InvalidValue => ErrorType::InvalidRequest,
            ErrorKind::Lookup => ErrorType::DoesNotExist,
            ErrorKind::TypeMismatch => ErrorType::TypeError,
            ErrorKind::FileNotFound => ErrorType::FileNotFound,
            ErrorKind::NotImplemented => ErrorType::NotImplemented,
            ErrorKind::Validation => ErrorType::ValidationError,
            ErrorKind::Upstream => ErrorType::ExternalApiError,
            ErrorKind::Unclassified => ErrorType::ServerError,
        }
    }
}

/// Errors that know their [`ErrorKind`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for std::io::Error {
    fn kind(&self) -> ErrorKind {
        match std::io::Error::kind(self) {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => {
                ErrorKind::InvalidValue
            }
            std::io::ErrorKind::Unsupported => ErrorKind::NotImplemented,
            _ => ErrorKind::Unclassified,
        }
    }
}

impl Classify for SerializationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TypeMismatch
    }
}

/// One failing input field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
}

impl FieldError {
    pub fn new<I, S>(loc: I, msg: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            loc: loc.into_iter().map(Into::into).collect(),
            msg: msg.into(),
        }
    }

    pub fn path(&self) -> String {
        self.loc.join(".")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path(), self.msg)
    }
}

fn flatten(errors: &ValidationErrors, prefix: &[String], out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let mut loc = prefix.to_vec();
        loc.push(field.to_string());
        match kind {
            ValidationErrorsKind::Field(failures) => {
                for failure in failures {
                    let msg = failure
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed {} check", failure.code));
                    out.push(FieldError {
                        loc: loc.clone(),
                        msg,
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten(nested, &loc, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    let mut item_loc = loc.clone();
                    item_loc.push(index.to_string());
                    flatten(nested, &item_loc, out);
                }
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidValue(String),

    #[error("{0}")]
    Lookup(String),

    #[error("{0}")]
    TypeMismatch(String),

    #[error("{0}")]
    FileNotFound(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("Validation error: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Response(ErrorResponse),

    #[error("Database error: {0}")]
    Database(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Classify for AppError {
    fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidValue(_) => ErrorKind::InvalidValue,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Lookup(_) => ErrorKind::Lookup,
            AppError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            AppError::FileNotFound(_) => ErrorKind::FileNotFound,
            AppError::NotImplemented(_) => ErrorKind::NotImplemented,
            AppError::Upstream(_) => ErrorKind::Upstream,
            AppError::Database(e) => e.kind(),
            AppError::Serialization(e) => e.kind(),
            AppError::Io(e) => Classify::kind(e),
            AppError::Response(_)
            | AppError::Cache(_)
            | AppError::Config(_)
            | AppError::Internal(_) => ErrorKind::Unclassified,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        flatten(&errors, &[], &mut fields);
        fields.sort();
        AppError::Validation(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(vec![FieldError::new(["body"], rejection.body_text())])
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(vec![FieldError::new(["query"], rejection.body_text())])
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(vec![FieldError::new(["path"], rejection.body_text())])
    }
}

impl From<ErrorResponse> for AppError {
    fn from(response: ErrorResponse) -> Self {
        AppError::Response(response)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Response(response) => {
                tracing::error!(code = response.code.as_u16(), "{}", response);
                response.into_response()
            }
            AppError::Validation(errors) => {
                tracing::warn!(errors = ?errors, "Validation error");
                ErrorResponse::process_validation_error(&errors).into_response()
            }
            other => {
                tracing::error!(error = %other, kind = ?other.kind(), "Request failed");
                ErrorResponse::process_exception(&other).into_response()
            }
        }
    }
}
