//! PostgreSQL-backed [`Store`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grapnel_core::SourceSystem;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;
use crate::migrations::run_migrations;
use crate::models::{
    AuditLogEntry, AuditLogFilter, CreateAuditLogEntry, CreateHashMatch, CreateHashRecord,
    CreateQueueItem, HashMatch, HashRecord, NotificationQueueItem, QueueStatusCounts,
    QueueTransition, UpsertWebhookSubscription, WebhookSubscription,
};
use crate::store::Store;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_hash(&self, input: &CreateHashRecord) -> Result<HashRecord, DbError> {
        Ok(HashRecord::create(&self.pool, input).await?)
    }

    async fn find_hashes(&self, hash_value: &str) -> Result<Vec<HashRecord>, DbError> {
        Ok(HashRecord::find_by_value(&self.pool, hash_value).await?)
    }

    async fn count_hashes(&self) -> Result<i64, DbError> {
        Ok(HashRecord::count(&self.pool).await?)
    }

    async fn count_distinct_sources(&self) -> Result<i64, DbError> {
        Ok(HashRecord::count_distinct_sources(&self.pool).await?)
    }

    async fn insert_match(&self, input: &CreateHashMatch) -> Result<HashMatch, DbError> {
        Ok(HashMatch::create(&self.pool, input).await?)
    }

    async fn count_matches_since(&self, since: DateTime<Utc>) -> Result<i64, DbError> {
        Ok(HashMatch::count_since(&self.pool, since).await?)
    }

    async fn enqueue(&self, input: &CreateQueueItem) -> Result<NotificationQueueItem, DbError> {
        Ok(NotificationQueueItem::create(&self.pool, input).await?)
    }

    async fn find_queue_item(&self, id: Uuid) -> Result<Option<NotificationQueueItem>, DbError> {
        Ok(NotificationQueueItem::find_by_id(&self.pool, id).await?)
    }

    async fn fetch_pending(&self, limit: i64) -> Result<Vec<NotificationQueueItem>, DbError> {
        Ok(NotificationQueueItem::fetch_pending(&self.pool, limit).await?)
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &QueueTransition,
    ) -> Result<bool, DbError> {
        Ok(NotificationQueueItem::apply_transition(&self.pool, id, transition).await?)
    }

    async fn queue_status_counts(&self) -> Result<QueueStatusCounts, DbError> {
        Ok(NotificationQueueItem::status_counts(&self.pool).await?)
    }

    async fn upsert_subscription(
        &self,
        input: &UpsertWebhookSubscription,
    ) -> Result<WebhookSubscription, DbError> {
        Ok(WebhookSubscription::upsert(&self.pool, input).await?)
    }

    async fn find_active_subscription(
        &self,
        system_id: SourceSystem,
    ) -> Result<Option<WebhookSubscription>, DbError> {
        Ok(WebhookSubscription::find_active(&self.pool, system_id).await?)
    }

    async fn deactivate_subscription(&self, system_id: SourceSystem) -> Result<bool, DbError> {
        Ok(WebhookSubscription::deactivate(&self.pool, system_id).await?)
    }

    async fn insert_audit(&self, input: &CreateAuditLogEntry) -> Result<AuditLogEntry, DbError> {
        Ok(AuditLogEntry::create(&self.pool, input).await?)
    }

    async fn list_audit(
        &self,
        filter: &AuditLogFilter,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, DbError> {
        Ok(AuditLogEntry::list(&self.pool, filter, limit).await?)
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(())
    }
}
