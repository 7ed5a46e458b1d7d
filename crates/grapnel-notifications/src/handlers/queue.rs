//! Read-only handlers for the notification queue.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{QueueItemResponse, QueueStatusResponse};
use crate::router::NotificationsState;

/// Item counts per queue status.
#[utoipa::path(
    get,
    path = "/notifications/queue/status",
    tag = "Notifications",
    responses(
        (status = 200, description = "Queue counts", body = QueueStatusResponse),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorResponse),
    )
)]
pub async fn queue_status_handler(
    State(state): State<NotificationsState>,
) -> ApiResult<Json<QueueStatusResponse>> {
    let counts = state.dispatcher.queue_status().await?;
    Ok(Json(QueueStatusResponse::from(counts)))
}

/// A single queue item.
#[utoipa::path(
    get,
    path = "/notifications/queue/{id}",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "Queue item ID")),
    responses(
        (status = 200, description = "Queue item", body = QueueItemResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_queue_item_handler(
    State(state): State<NotificationsState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<QueueItemResponse>> {
    let item = state.dispatcher.get_queue_item(id).await?;
    Ok(Json(QueueItemResponse::from(item)))
}
