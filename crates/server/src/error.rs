use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vidhook_core::error::{ApiError, ErrorEnvelope};

/// `ApiError` plus any extra top-level keys for the error envelope.
#[derive(Debug)]
pub struct AppError {
    pub error: ApiError,
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl AppError {
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut envelope = ErrorEnvelope::from(&self.error);
        envelope.details = self.details;
        (status, Json(envelope)).into_response()
    }
}

impl From<ApiError> for AppError {
    fn from(error: ApiError) -> Self {
        Self {
            error,
            details: serde_json::Map::new(),
        }
    }
}

/// The 413 error for a body limit of `limit_bytes`.
pub fn payload_too_large(limit_bytes: usize) -> ApiError {
    ApiError::PayloadTooLarge(format!(
        "File too large. Maximum size is {}MB.",
        limit_bytes / (1024 * 1024)
    ))
}
