//! Axum router setup for notification endpoints.

use axum::{routing::get, routing::post, Router};

use crate::handlers::{queue, subscriptions};
use crate::services::dispatcher::Dispatcher;
use crate::services::subscription_service::SubscriptionService;

/// Shared state for notification handlers.
#[derive(Clone)]
pub struct NotificationsState {
    pub subscription_service: SubscriptionService,
    pub dispatcher: Dispatcher,
}

impl NotificationsState {
    pub fn new(subscription_service: SubscriptionService, dispatcher: Dispatcher) -> Self {
        Self {
            subscription_service,
            dispatcher,
        }
    }
}

/// Creates the notifications router with all routes.
pub fn notifications_router(state: NotificationsState) -> Router {
    Router::new()
        .route(
            "/notifications/subscribe",
            post(subscriptions::subscribe_handler),
        )
        .route(
            "/notifications/subscriptions/:system_id",
            get(subscriptions::get_subscription_handler)
                .delete(subscriptions::unsubscribe_handler),
        )
        .route("/notifications/queue/status", get(queue::queue_status_handler))
        .route("/notifications/queue/:id", get(queue::get_queue_item_handler))
        .with_state(state)
}
