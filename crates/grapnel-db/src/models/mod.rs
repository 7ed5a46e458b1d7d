//! Row models and their queries.

pub mod audit_log;
pub mod hash_match;
pub mod hash_record;
pub mod notification_queue;
pub mod webhook_subscription;

pub use audit_log::{AuditLogEntry, AuditLogFilter, CreateAuditLogEntry};
pub use hash_match::{CreateHashMatch, HashMatch, EXACT_MATCH_CONFIDENCE};
pub use hash_record::{CreateHashRecord, HashRecord};
pub use notification_queue::{
    CreateQueueItem, NotificationQueueItem, QueueStatusCounts, QueueTransition,
};
pub use webhook_subscription::{UpsertWebhookSubscription, WebhookSubscription};
