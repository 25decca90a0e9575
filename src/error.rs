//! Error types for verification, model loading and configuration.

use axum::http::StatusCode;
use thiserror::Error;

/// Malformed caller input. Always the caller's fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field {field} is not a number")]
    NotANumber { field: &'static str },

    #[error("field {field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("not enough movement data: {moves} move events, need at least {required}")]
    InsufficientTelemetry { moves: usize, required: usize },

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Failures of a single verification request.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("model not loaded; train the model and restart the service")]
    ModelUnavailable,

    #[error("model returned non-finite confidence: {value}")]
    ModelFault { value: f64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl VerifyError {
    /// HTTP status for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerifyError::Validation(_) => StatusCode::BAD_REQUEST,
            VerifyError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            VerifyError::ModelFault { .. } | VerifyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            VerifyError::Validation(_) => "validation_error",
            VerifyError::ModelUnavailable => "model_unavailable",
            VerifyError::ModelFault { .. } => "model_fault",
            VerifyError::Internal(_) => "internal_error",
        }
    }
}

/// Loading a persisted classifier artifact.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model payload: {0}")]
    Invalid(String),
}

/// Loading or validating the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: VerifyError = ValidationError::MissingField("click_delay").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(VerifyError::ModelUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            VerifyError::ModelFault { value: f64::NAN }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_malformed_body_is_client_error() {
        let err: VerifyError = ValidationError::MalformedBody("expected a map".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_codes_are_snake_case() {
        assert_eq!(VerifyError::ModelUnavailable.code(), "model_unavailable");
        assert_eq!(VerifyError::ModelFault { value: 2.0 }.code(), "model_fault");
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = ValidationError::NonFinite { field: "idle_time", value: f64::INFINITY };
        assert!(err.to_string().contains("idle_time"));
    }
}
