//! Error types for web handlers.
//!
//! Bridges the domain error taxonomy to HTTP responses via Axum's
//! `IntoResponse`. Each domain category maps to exactly one status code, so
//! clients can branch on the status without parsing messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use homestead_core::MarketError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: &'static str) -> Self {
        Self {
            status,
            message,
            code,
        }
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST")
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into(), "UNAUTHORIZED")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR",
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl From<MarketError> for AppError {
    fn from(err: MarketError) -> Self {
        let message = err.to_string();
        match err {
            MarketError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
            }
            MarketError::Forbidden { .. } => {
                Self::new(StatusCode::FORBIDDEN, message, "FORBIDDEN")
            }
            MarketError::Conflict { .. } => Self::new(StatusCode::CONFLICT, message, "CONFLICT"),
            MarketError::BadRequest { .. } => {
                Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
            }
            MarketError::ExternalFailure { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, message, "EXTERNAL_FAILURE")
            }
            MarketError::Unconfigured { .. } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                message,
                "NOT_CONFIGURED",
            ),
            MarketError::Storage(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage error".to_string(),
                "INTERNAL_SERVER_ERROR",
            ),
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                "internal server error"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] invalid input");
    }

    #[test]
    fn test_domain_error_mapping() {
        let err: AppError = MarketError::not_found("property").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: AppError = MarketError::conflict("held by someone else").into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: AppError = MarketError::external("gateway down").into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_storage_details_are_not_exposed() {
        let err: AppError = MarketError::Storage("password=hunter2".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("hunter2"));
    }
}
