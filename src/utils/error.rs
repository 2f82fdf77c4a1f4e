//! Error handling module
//!
//! Defines the relay's error types and their HTTP mapping

use crate::models::{ErrorBody, ErrorResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream transport error
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] anyhow::Error),

    /// Unknown provider in the request path
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl AppError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::UnknownProvider(_) => "not_found_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::Config(_) => "api_error",
        }
    }

    /// Convert to an OpenAI-style error body
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                error_type: self.error_type().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Application error: {} - Status code: {}", self, status);
        } else {
            tracing::warn!("Client error: {} - Status code: {}", self, status);
        }

        (status, Json(self.to_error_response())).into_response()
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::UnknownProvider("x".to_string()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Upstream(anyhow::anyhow!("reset")).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Config("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_body() {
        let body = AppError::UnknownProvider("nope".to_string()).to_error_response();
        assert_eq!(body.error.error_type, "not_found_error");
        assert_eq!(body.error.message, "Unknown provider: nope");
    }
}
