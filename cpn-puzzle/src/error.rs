//! HTTP error type for cpn-puzzle
//!
//! Maps the orchestrator's [`PuzzleError`] onto status codes. Body shape:
//! `{"error": {"code": ..., "message": ...}}`.

use crate::services::{PuzzleError, UpstreamError};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Required upstream missing or shutting down (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Upstream failed or produced unusable output (502)
    #[error("Upstream failure: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<PuzzleError> for ApiError {
    fn from(err: PuzzleError) -> Self {
        let message = err.to_string();
        match err {
            PuzzleError::Validation(_) => ApiError::BadRequest(message),
            PuzzleError::Configuration(_) | PuzzleError::Cancelled => {
                ApiError::ServiceUnavailable(message)
            }
            PuzzleError::Upstream {
                source: UpstreamError::NotFound(_),
                ..
            } => ApiError::NotFound(message),
            PuzzleError::Upstream { .. } | PuzzleError::Exhausted { .. } => {
                ApiError::BadGateway(message)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Response for a handler that panicked (used by `CatchPanicLayer`)
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Handler panicked");
    ApiError::Internal("request handler failed".to_string()).into_response()
}
