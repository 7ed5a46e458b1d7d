//! Request/response DTOs and wire payloads for notifications.

use chrono::{DateTime, Utc};
use grapnel_core::{
    HashType, MatchType, NotificationStatus, NotificationType, Severity, SourceSystem,
};
use grapnel_db::{NotificationQueueItem, QueueStatusCounts, WebhookSubscription};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// ---------------------------------------------------------------------------
// Match events and webhook envelopes
// ---------------------------------------------------------------------------

/// A detected cross-partner match. Serialized as the `data` of a
/// `hash_match` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MatchEvent {
    /// Shared by every queue item this event spawns.
    pub match_id: Uuid,
    pub hash_value: String,
    pub hash_type: HashType,
    /// System whose registration produced the match.
    pub new_source_system: SourceSystem,
    /// System that already held the value, when known.
    pub existing_source_system: Option<SourceSystem>,
    pub severity: Severity,
    pub new_hash_id: Option<Uuid>,
    pub matched_hash_id: Option<Uuid>,
    pub match_type: MatchType,
    pub confidence_score: f64,
    pub detected_at: DateTime<Utc>,
}

/// Body POSTed to a partner webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: NotificationType,
    /// RFC 3339 time the attempt was made.
    pub timestamp: String,
    pub data: JsonValue,
    /// The queue item id; stable across retries.
    pub notification_id: Uuid,
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Request to subscribe a partner system to notifications.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SubscribeRequest {
    /// One of `trace`, `grapnel`, `takedown`.
    pub system_id: String,

    /// Must start with `http://` or `https://`.
    #[validate(length(min = 1, max = 2048))]
    pub webhook_url: String,

    /// Defaults to every notification type.
    pub notification_types: Option<Vec<String>>,

    /// Partner-defined JSON object kept with the subscription and returned on
    /// reads. At most 64 keys per object and 4 levels deep.
    #[schema(value_type = Option<Object>)]
    pub filters: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscribeResponse {
    pub success: bool,
    pub message: String,
    pub subscription_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub system_id: SourceSystem,
    pub webhook_url: String,
    pub notification_types: Vec<NotificationType>,
    #[schema(value_type = Object)]
    pub filters: JsonValue,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WebhookSubscription> for SubscriptionResponse {
    fn from(s: WebhookSubscription) -> Self {
        Self {
            id: s.id,
            system_id: s.system_id,
            webhook_url: s.webhook_url,
            notification_types: s.notification_types,
            filters: s.filters,
            active: s.active,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnsubscribeResponse {
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct QueueStatusResponse {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub acknowledged: i64,
    pub total: i64,
}

impl From<QueueStatusCounts> for QueueStatusResponse {
    fn from(c: QueueStatusCounts) -> Self {
        Self {
            pending: c.pending,
            sent: c.sent,
            failed: c.failed,
            acknowledged: c.acknowledged,
            total: c.total(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueueItemResponse {
    pub id: Uuid,
    pub match_id: Uuid,
    pub target_system: SourceSystem,
    pub notification_type: NotificationType,
    #[schema(value_type = Object)]
    pub payload: JsonValue,
    pub status: NotificationStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<NotificationQueueItem> for QueueItemResponse {
    fn from(i: NotificationQueueItem) -> Self {
        Self {
            id: i.id,
            match_id: i.match_id,
            target_system: i.target_system,
            notification_type: i.notification_type,
            payload: i.payload,
            status: i.status,
            retry_count: i.retry_count,
            created_at: i.created_at,
            sent_at: i.sent_at,
        }
    }
}
