//! Storage abstraction shared by every service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grapnel_core::SourceSystem;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    AuditLogEntry, AuditLogFilter, CreateAuditLogEntry, CreateHashMatch, CreateHashRecord,
    CreateQueueItem, HashMatch, HashRecord, NotificationQueueItem, QueueStatusCounts,
    QueueTransition, UpsertWebhookSubscription, WebhookSubscription,
};

/// Durable storage for the exchange.
///
/// Implementations must be safe to share between request handlers and the
/// background dispatcher.
#[async_trait]
pub trait Store: Send + Sync {
    // -- hash registry ------------------------------------------------------

    async fn insert_hash(&self, input: &CreateHashRecord) -> Result<HashRecord, DbError>;

    /// All registrations of a normalized value, oldest first.
    async fn find_hashes(&self, hash_value: &str) -> Result<Vec<HashRecord>, DbError>;

    async fn count_hashes(&self) -> Result<i64, DbError>;

    async fn count_distinct_sources(&self) -> Result<i64, DbError>;

    // -- matches ------------------------------------------------------------

    async fn insert_match(&self, input: &CreateHashMatch) -> Result<HashMatch, DbError>;

    async fn count_matches_since(&self, since: DateTime<Utc>) -> Result<i64, DbError>;

    // -- notification queue -------------------------------------------------

    async fn enqueue(&self, input: &CreateQueueItem) -> Result<NotificationQueueItem, DbError>;

    async fn find_queue_item(&self, id: Uuid) -> Result<Option<NotificationQueueItem>, DbError>;

    /// Up to `limit` pending items.
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<NotificationQueueItem>, DbError>;

    /// Apply `transition` only if the item is still pending.
    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &QueueTransition,
    ) -> Result<bool, DbError>;

    async fn queue_status_counts(&self) -> Result<QueueStatusCounts, DbError>;

    // -- webhook subscriptions ----------------------------------------------

    async fn upsert_subscription(
        &self,
        input: &UpsertWebhookSubscription,
    ) -> Result<WebhookSubscription, DbError>;

    async fn find_active_subscription(
        &self,
        system_id: SourceSystem,
    ) -> Result<Option<WebhookSubscription>, DbError>;

    /// Returns whether an active subscription was deactivated.
    async fn deactivate_subscription(&self, system_id: SourceSystem) -> Result<bool, DbError>;

    // -- audit --------------------------------------------------------------

    async fn insert_audit(&self, input: &CreateAuditLogEntry) -> Result<AuditLogEntry, DbError>;

    /// Most recent entries first.
    async fn list_audit(
        &self,
        filter: &AuditLogFilter,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, DbError>;

    // -- health -------------------------------------------------------------

    async fn ping(&self) -> Result<(), DbError>;
}
