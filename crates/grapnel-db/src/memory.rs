//! In-process [`Store`] for tests and local development.
//!
//! Semantics follow the PostgreSQL backend: registrations are append-only,
//! queue transitions only apply to pending items, and subscriptions are
//! soft-deleted.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grapnel_core::{NotificationStatus, SourceSystem};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    AuditLogEntry, AuditLogFilter, CreateAuditLogEntry, CreateHashMatch, CreateHashRecord,
    CreateQueueItem, HashMatch, HashRecord, NotificationQueueItem, QueueStatusCounts,
    QueueTransition, UpsertWebhookSubscription, WebhookSubscription,
};
use crate::store::Store;

#[derive(Default)]
struct Tables {
    hashes: Vec<HashRecord>,
    matches: Vec<HashMatch>,
    queue: Vec<NotificationQueueItem>,
    subscriptions: BTreeMap<SourceSystem, WebhookSubscription>,
    audit: Vec<AuditLogEntry>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every queue item, in insertion order.
    pub async fn queue_items(&self) -> Vec<NotificationQueueItem> {
        self.tables.read().await.queue.clone()
    }

    /// Snapshot of every recorded match.
    pub async fn matches(&self) -> Vec<HashMatch> {
        self.tables.read().await.matches.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_hash(&self, input: &CreateHashRecord) -> Result<HashRecord, DbError> {
        let record = HashRecord {
            id: Uuid::new_v4(),
            hash_value: input.hash_value.clone(),
            hash_type: input.hash_type,
            source_system: input.source_system,
            source_id: input.source_id.clone(),
            severity: input.severity,
            tags: input.tags.clone(),
            metadata: input.metadata.clone(),
            created_at: Utc::now(),
        };
        self.tables.write().await.hashes.push(record.clone());
        Ok(record)
    }

    async fn find_hashes(&self, hash_value: &str) -> Result<Vec<HashRecord>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .hashes
            .iter()
            .filter(|r| r.hash_value == hash_value)
            .cloned()
            .collect())
    }

    async fn count_hashes(&self) -> Result<i64, DbError> {
        Ok(self.tables.read().await.hashes.len() as i64)
    }

    async fn count_distinct_sources(&self) -> Result<i64, DbError> {
        let tables = self.tables.read().await;
        let systems: HashSet<SourceSystem> = tables.hashes.iter().map(|r| r.source_system).collect();
        Ok(systems.len() as i64)
    }

    async fn insert_match(&self, input: &CreateHashMatch) -> Result<HashMatch, DbError> {
        let record = HashMatch {
            id: input.id,
            hash_value: input.hash_value.clone(),
            hash_type: input.hash_type,
            source_system: input.source_system,
            matched_system: input.matched_system,
            primary_hash_id: input.primary_hash_id,
            matched_hash_id: input.matched_hash_id,
            match_type: input.match_type,
            confidence_score: input.confidence_score,
            severity: input.severity,
            systems_notified: input.systems_notified.clone(),
            detected_at: Utc::now(),
        };
        self.tables.write().await.matches.push(record.clone());
        Ok(record)
    }

    async fn count_matches_since(&self, since: DateTime<Utc>) -> Result<i64, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.matches.iter().filter(|m| m.detected_at >= since).count() as i64)
    }

    async fn enqueue(&self, input: &CreateQueueItem) -> Result<NotificationQueueItem, DbError> {
        let item = NotificationQueueItem {
            id: Uuid::new_v4(),
            match_id: input.match_id,
            target_system: input.target_system,
            notification_type: input.notification_type,
            payload: input.payload.clone(),
            status: NotificationStatus::Pending,
            retry_count: 0,
            created_at: Utc::now(),
            sent_at: None,
        };
        self.tables.write().await.queue.push(item.clone());
        Ok(item)
    }

    async fn find_queue_item(&self, id: Uuid) -> Result<Option<NotificationQueueItem>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables.queue.iter().find(|i| i.id == id).cloned())
    }

    async fn fetch_pending(&self, limit: i64) -> Result<Vec<NotificationQueueItem>, DbError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let tables = self.tables.read().await;
        Ok(tables
            .queue
            .iter()
            .filter(|i| i.status == NotificationStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &QueueTransition,
    ) -> Result<bool, DbError> {
        let mut tables = self.tables.write().await;
        match tables
            .queue
            .iter_mut()
            .find(|i| i.id == id && i.status == NotificationStatus::Pending)
        {
            Some(item) => {
                item.status = transition.status;
                item.retry_count = transition.retry_count;
                item.sent_at = transition.sent_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn queue_status_counts(&self) -> Result<QueueStatusCounts, DbError> {
        let tables = self.tables.read().await;
        let mut counts = QueueStatusCounts::default();
        for item in &tables.queue {
            counts.add(item.status, 1);
        }
        Ok(counts)
    }

    async fn upsert_subscription(
        &self,
        input: &UpsertWebhookSubscription,
    ) -> Result<WebhookSubscription, DbError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let subscription = tables
            .subscriptions
            .entry(input.system_id)
            .and_modify(|existing| {
                existing.webhook_url = input.webhook_url.clone();
                existing.notification_types = input.notification_types.clone();
                existing.filters = input.filters.clone();
                existing.active = true;
                existing.updated_at = now;
            })
            .or_insert_with(|| WebhookSubscription {
                id: Uuid::new_v4(),
                system_id: input.system_id,
                webhook_url: input.webhook_url.clone(),
                notification_types: input.notification_types.clone(),
                filters: input.filters.clone(),
                active: true,
                created_at: now,
                updated_at: now,
            });
        Ok(subscription.clone())
    }

    async fn find_active_subscription(
        &self,
        system_id: SourceSystem,
    ) -> Result<Option<WebhookSubscription>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .get(&system_id)
            .filter(|s| s.active)
            .cloned())
    }

    async fn deactivate_subscription(&self, system_id: SourceSystem) -> Result<bool, DbError> {
        let mut tables = self.tables.write().await;
        match tables.subscriptions.get_mut(&system_id) {
            Some(subscription) if subscription.active => {
                subscription.active = false;
                subscription.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_audit(&self, input: &CreateAuditLogEntry) -> Result<AuditLogEntry, DbError> {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            action: input.action.clone(),
            system_id: input.system_id.clone(),
            user_id: input.user_id.clone(),
            resource_id: input.resource_id.clone(),
            details: input.details.clone(),
            created_at: Utc::now(),
        };
        self.tables.write().await.audit.push(entry.clone());
        Ok(entry)
    }

    async fn list_audit(
        &self,
        filter: &AuditLogFilter,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, DbError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let tables = self.tables.read().await;
        Ok(tables
            .audit
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}
