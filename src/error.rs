use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Missing configuration: {0}")]
    Configuration(String),

    #[error("Conversion failed: {0}")]
    StrategyExecution(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Image processing failed: {0}")]
    PartialItemFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Stable tag reported in error responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Validation(_) => "ValidationError",
            ConvertError::Configuration(_) => "ConfigurationError",
            ConvertError::StrategyExecution(_) | ConvertError::Io(_) => "StrategyExecutionError",
            ConvertError::InvalidGeometry(_) => "InvalidGeometry",
            ConvertError::PartialItemFailure(_) => "PartialItemFailure",
        }
    }

    /// Whether the alternate strategy is worth trying after this failure.
    /// Validation and geometry errors would fail identically on a retry.
    pub fn allows_fallback(&self) -> bool {
        match self {
            ConvertError::Validation(_) | ConvertError::InvalidGeometry(_) => false,
            ConvertError::Configuration(_)
            | ConvertError::StrategyExecution(_)
            | ConvertError::PartialItemFailure(_)
            | ConvertError::Io(_) => true,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ConvertError::Validation(_) => StatusCode::BAD_REQUEST,
            ConvertError::InvalidGeometry(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ConvertError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            ConvertError::StrategyExecution(_)
            | ConvertError::PartialItemFailure(_)
            | ConvertError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        }));

        (self.status(), body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            ConvertError::Validation("x".into()).kind(),
            "ValidationError"
        );
        assert_eq!(
            ConvertError::InvalidGeometry("x".into()).kind(),
            "InvalidGeometry"
        );
    }

    #[test]
    fn fallback_eligibility() {
        assert!(!ConvertError::Validation("x".into()).allows_fallback());
        assert!(!ConvertError::InvalidGeometry("x".into()).allows_fallback());
        assert!(ConvertError::Configuration("x".into()).allows_fallback());
        assert!(ConvertError::StrategyExecution("x".into()).allows_fallback());
    }
}
