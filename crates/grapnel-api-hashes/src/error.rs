//! Error types for the Hash Registry API.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use grapnel_db::DbError;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by hash registry operations.
#[derive(Debug, Error)]
pub enum HashApiError {
    /// Request input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Admission control rejected the request.
    #[error("{reason}")]
    RateLimited { reason: String, retry_after_secs: u64 },

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response format for API errors.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl HashApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            HashApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            HashApiError::RateLimited { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
            }
            HashApiError::Database(e) if e.is_unavailable() => {
                (StatusCode::SERVICE_UNAVAILABLE, "database_unavailable")
            }
            HashApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            HashApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for HashApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(target: "hash_registry", error = %self, "Request failed");
        }

        let retry_after = match &self {
            HashApiError::RateLimited { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, HashApiError>;
