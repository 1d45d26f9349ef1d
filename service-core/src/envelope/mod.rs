//! Uniform response envelopes.
//!
//! Every HTTP body produced by a service is either a [`SuccessResponse`] or an
//! [`ErrorResponse`]. Both carry their HTTP status in the `code` field and the
//! transport status is always taken from it.

pub mod error;
pub mod success;

pub use error::{ErrorDetail, ErrorResponse, ErrorType, Violation};
pub use success::{Meta, SuccessResponse};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// `StatusCode` as its integer value.
pub(crate) mod status_code {
    use axum::http::StatusCode;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(code: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(code.as_u16())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatusCode, D::Error> {
        let raw = u16::deserialize(deserializer)?;
        StatusCode::from_u16(raw).map_err(serde::de::Error::custom)
    }
}
