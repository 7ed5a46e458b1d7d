//! Error types for the notification system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use grapnel_core::SourceSystem;
use grapnel_db::DbError;
use serde::Serialize;
use utoipa::ToSchema;

/// Notification system error variants.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No active subscription for {0}")]
    SubscriptionNotFound(String),

    #[error("Queue item not found")]
    QueueItemNotFound,

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON error response returned by notification endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            NotificationError::Database(e) if e.is_unavailable() => {
                (StatusCode::SERVICE_UNAVAILABLE, "database_unavailable")
            }
            NotificationError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            NotificationError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "invalid_url"),
            NotificationError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            NotificationError::SubscriptionNotFound(_) => {
                (StatusCode::NOT_FOUND, "subscription_not_found")
            }
            NotificationError::QueueItemNotFound => (StatusCode::NOT_FOUND, "queue_item_not_found"),
            NotificationError::Signing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "signing_error"),
            NotificationError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::error!(target: "notification_dispatch", error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, NotificationError>;

/// Why a single delivery attempt did not succeed. Never surfaced to API
/// callers; it only drives the retry state machine and logs.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryFailure {
    #[error("No active subscription for {0}")]
    NoSubscription(SourceSystem),

    #[error("Webhook URL resolution failed: {0}")]
    Resolution(String),

    #[error("Failed to build payload: {0}")]
    Payload(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request error: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for DeliveryFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeliveryFailure::Timeout
        } else if e.is_connect() {
            DeliveryFailure::Connect(e.to_string())
        } else {
            DeliveryFailure::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let response = NotificationError::Validation("bad".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = NotificationError::SubscriptionNotFound("trace".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = NotificationError::QueueItemNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unreachable_store_maps_to_503() {
        let err = NotificationError::Database(DbError::Unavailable("down".into()));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_delivery_failure_messages() {
        assert_eq!(DeliveryFailure::Status(503).to_string(), "HTTP 503");
        assert_eq!(
            DeliveryFailure::NoSubscription(SourceSystem::Trace).to_string(),
            "No active subscription for trace"
        );
    }
}
