//! Common error types for the shared-seed gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Please wait before generating again")]
    AdmissionDenied,

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Seed is free; supply a generations lock (1-100) to start a new run")]
    RunLocked,

    #[error("Generation timed out: {0}")]
    BackendTimeout(String),

    #[error("Generation failed: {0}")]
    BackendFailure(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire error format: a stable machine-readable kind plus a human message
#[derive(Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl AppError {
    /// Stable machine-readable kind string for the wire format
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "internal",
            AppError::Io(_) => "storage_failure",
            AppError::Json(_) => "invalid_input",
            AppError::HttpClient(_) => "backend_failure",
            AppError::AdmissionDenied => "admission_denied",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::RunLocked => "run_locked",
            AppError::BackendTimeout(_) => "backend_timeout",
            AppError::BackendFailure(_) => "backend_failure",
            AppError::Storage(_) => "storage_failure",
            AppError::NotFound(_) => "not_found",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::AdmissionDenied => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::RunLocked => StatusCode::CONFLICT,
            AppError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::BackendFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            kind: self.kind().to_string(),
            message: self.to_string(),
        });

        (self.status(), body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(AppError::AdmissionDenied.kind(), "admission_denied");
        assert_eq!(AppError::RunLocked.kind(), "run_locked");
        assert_eq!(AppError::BackendTimeout("x".into()).kind(), "backend_timeout");
        assert_eq!(AppError::InvalidInput("x".into()).kind(), "invalid_input");
    }

    #[test]
    fn test_run_locked_maps_to_conflict() {
        assert_eq!(AppError::RunLocked.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::AdmissionDenied.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
