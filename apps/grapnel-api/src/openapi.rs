//! `OpenAPI` document for the service.

use axum::Json;
use utoipa::OpenApi;

use grapnel_api_hashes::models::{
    HashLookupRequest, HashLookupResponse, HashMatchResult, HashRegisterRequest,
    HashRegisterResponse, HashStats, RegisterOutcome, SourceEntry,
};
use grapnel_core::{
    HashType, MatchType, NotificationStatus, NotificationType, Severity, SourceSystem,
};
use grapnel_notifications::models::{
    QueueItemResponse, QueueStatusResponse, SubscribeRequest, SubscribeResponse,
    SubscriptionResponse, UnsubscribeResponse,
};
use grapnel_notifications::ErrorResponse;

use crate::audit::AuditEntryResponse;
use crate::health::{BannerResponse, ComponentStatus, Components, HealthResponse, ReadinessResponse};

/// `OpenAPI` documentation. Hash, notification and audit paths are served
/// under the configured API prefix (`/api/v1` by default).
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Grapnel API",
        version = "0.1.0",
        description = "Hash threat-intelligence exchange between the trace, grapnel and takedown partners"
    ),
    paths(
        crate::health::health_handler,
        crate::health::ready_handler,
        crate::audit::list_audit_handler,
        grapnel_api_hashes::handlers::hashes::lookup_handler,
        grapnel_api_hashes::handlers::hashes::register_handler,
        grapnel_api_hashes::handlers::hashes::stats_handler,
        grapnel_notifications::handlers::subscriptions::subscribe_handler,
        grapnel_notifications::handlers::subscriptions::get_subscription_handler,
        grapnel_notifications::handlers::subscriptions::unsubscribe_handler,
        grapnel_notifications::handlers::queue::queue_status_handler,
        grapnel_notifications::handlers::queue::get_queue_item_handler,
    ),
    components(schemas(
        ErrorResponse,
        SourceSystem,
        HashType,
        Severity,
        MatchType,
        NotificationType,
        NotificationStatus,
        HashLookupRequest,
        HashLookupResponse,
        HashMatchResult,
        SourceEntry,
        HashRegisterRequest,
        HashRegisterResponse,
        RegisterOutcome,
        HashStats,
        SubscribeRequest,
        SubscribeResponse,
        SubscriptionResponse,
        UnsubscribeResponse,
        QueueStatusResponse,
        QueueItemResponse,
        AuditEntryResponse,
        HealthResponse,
        ReadinessResponse,
        Components,
        ComponentStatus,
        BannerResponse,
    )),
    tags(
        (name = "Health", description = "Service health and readiness"),
        (name = "Hashes", description = "Hash registration, lookup and statistics"),
        (name = "Notifications", description = "Partner webhook subscriptions and the delivery queue"),
        (name = "Audit", description = "Audit trail"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
