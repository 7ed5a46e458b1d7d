//! Handlers for partner webhook subscriptions.

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::error::{ApiResult, NotificationError};
use crate::models::{
    SubscribeRequest, SubscribeResponse, SubscriptionResponse, UnsubscribeResponse,
};
use crate::router::NotificationsState;

/// Subscribe a partner system to notifications. Replaces any previous
/// subscription for the same system.
#[utoipa::path(
    post,
    path = "/notifications/subscribe",
    tag = "Notifications",
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Subscription registered", body = SubscribeResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorResponse),
    )
)]
pub async fn subscribe_handler(
    State(state): State<NotificationsState>,
    Json(request): Json<SubscribeRequest>,
) -> ApiResult<Json<SubscribeResponse>> {
    request
        .validate()
        .map_err(|e| NotificationError::Validation(e.to_string()))?;

    let system_id = request.system_id.clone();
    let subscription = state.subscription_service.subscribe(request).await?;

    Ok(Json(SubscribeResponse {
        success: true,
        message: format!("Subscribed {system_id} to notifications"),
        subscription_id: subscription.id,
    }))
}

/// Get the active subscription for a partner system.
#[utoipa::path(
    get,
    path = "/notifications/subscriptions/{system_id}",
    tag = "Notifications",
    params(("system_id" = String, Path, description = "Partner system")),
    responses(
        (status = 200, description = "Active subscription", body = SubscriptionResponse),
        (status = 400, description = "Unknown system", body = crate::error::ErrorResponse),
        (status = 404, description = "No active subscription", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_subscription_handler(
    State(state): State<NotificationsState>,
    Path(system_id): Path<String>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let subscription = state.subscription_service.get(&system_id).await?;
    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// Deactivate a partner's subscription. The record is retained.
#[utoipa::path(
    delete,
    path = "/notifications/subscriptions/{system_id}",
    tag = "Notifications",
    params(("system_id" = String, Path, description = "Partner system")),
    responses(
        (status = 200, description = "Subscription deactivated", body = UnsubscribeResponse),
        (status = 400, description = "Unknown system", body = crate::error::ErrorResponse),
        (status = 404, description = "No active subscription", body = crate::error::ErrorResponse),
    )
)]
pub async fn unsubscribe_handler(
    State(state): State<NotificationsState>,
    Path(system_id): Path<String>,
) -> ApiResult<Json<UnsubscribeResponse>> {
    state.subscription_service.unsubscribe(&system_id).await?;
    Ok(Json(UnsubscribeResponse {
        success: true,
        message: format!("Unsubscribed {system_id} from notifications"),
    }))
}
