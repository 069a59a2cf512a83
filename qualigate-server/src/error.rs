//! HTTP error responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use qualigate_core::{ErrorKind, QualigateError};
use serde_json::{Map, Value, json};

/// Wire name for request bodies that fail to parse.
pub const REQUEST_VALIDATION_ERROR: &str = "request_validation_error";

/// An error rendered as `{"error":{"type","message","details","status"}}`.
#[derive(Debug)]
pub struct ApiError {
    /// Response status
    pub status: StatusCode,
    /// Machine-readable error type
    pub error_type: &'static str,
    /// Human-readable message
    pub message: String,
    /// Structured diagnostics
    pub details: Map<String, Value>,
}

impl ApiError {
    /// Maps an error kind onto its HTTP status.
    pub const fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::ConfigurationError => StatusCode::BAD_REQUEST,
            ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::ScanExecutionError | ErrorKind::ExecutionError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<QualigateError> for ApiError {
    fn from(err: QualigateError) -> Self {
        let kind = err.kind();
        Self {
            status: Self::status_for(kind),
            error_type: kind.as_str(),
            message: err.message(),
            details: err.details(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error_type: REQUEST_VALIDATION_ERROR,
            message: rejection.body_text(),
            details: Map::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "type": self.error_type,
                "message": self.message,
                "details": self.details,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}
