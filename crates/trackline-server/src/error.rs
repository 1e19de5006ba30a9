use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use trackline_core::error::AppError;

use crate::dto::ErrorResponse;

/// Errors a handler can answer with. Tracking itself never fails: problems
/// while tracking are reported inside a normal 200 response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body is well-formed JSON but not a valid tracking request.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    App(#[from] AppError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::App(AppError::SerializationError(_)) => {
                (StatusCode::BAD_REQUEST, "serialization_error")
            }
            ApiError::App(AppError::ConfigError(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error")
            }
            ApiError::App(AppError::RateLimitExceeded) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
            }
            ApiError::App(AppError::Timeout(_)) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            ApiError::App(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
