use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_steps() -> u32 {
    10
}

fn default_dimension() -> u32 {
    256
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ImageRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub prompt: String,

    #[serde(default = "default_steps")]
    #[validate(range(min = 1, max = 150))]
    pub steps: u32,

    #[serde(default = "default_dimension")]
    #[validate(range(min = 64, max = 2048))]
    pub width: u32,

    #[serde(default = "default_dimension")]
    #[validate(range(min = 64, max = 2048))]
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageResponse {
    /// Path of the generated PNG.
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_fields_take_defaults() {
        let request: ImageRequest = serde_json::from_str(r#"{"prompt":"a cat"}"#).unwrap();
        assert_eq!((request.steps, request.width, request.height), (10, 256, 256));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn out_of_range_steps_fail_validation() {
        let request: ImageRequest =
            serde_json::from_str(r#"{"prompt":"a cat","steps":0}"#).unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("steps"));
    }
}
