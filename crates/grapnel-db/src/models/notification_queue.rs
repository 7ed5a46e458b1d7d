//! Notification queue rows.
//!
//! Items are created `pending` with `retry_count = 0`. The dispatcher moves them
//! to `sent` or back to `pending` with a higher retry count, and finally to
//! `failed`. Transitions only ever apply to items that are still pending, so a
//! terminal item is never reopened by a slower dispatcher.

use chrono::{DateTime, Utc};
use grapnel_core::{NotificationStatus, NotificationType, SourceSystem};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A queued notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NotificationQueueItem {
    pub id: Uuid,
    /// Correlates every item spawned by the same match event.
    pub match_id: Uuid,
    #[sqlx(try_from = "String")]
    pub target_system: SourceSystem,
    #[sqlx(try_from = "String")]
    pub notification_type: NotificationType,
    pub payload: JsonValue,
    #[sqlx(try_from = "String")]
    pub status: NotificationStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl NotificationQueueItem {
    /// Copy of this item with `transition` applied.
    #[must_use]
    pub fn with_transition(mut self, transition: &QueueTransition) -> Self {
        self.status = transition.status;
        self.retry_count = transition.retry_count;
        self.sent_at = transition.sent_at;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CreateQueueItem {
    pub match_id: Uuid,
    pub target_system: SourceSystem,
    pub notification_type: NotificationType,
    pub payload: JsonValue,
}

/// New state written after a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTransition {
    pub status: NotificationStatus,
    pub retry_count: i32,
    pub sent_at: Option<DateTime<Utc>>,
}

impl QueueTransition {
    pub fn sent(retry_count: i32, at: DateTime<Utc>) -> Self {
        Self {
            status: NotificationStatus::Sent,
            retry_count,
            sent_at: Some(at),
        }
    }

    pub fn retry(retry_count: i32) -> Self {
        Self {
            status: NotificationStatus::Pending,
            retry_count,
            sent_at: None,
        }
    }

    pub fn failed(retry_count: i32) -> Self {
        Self {
            status: NotificationStatus::Failed,
            retry_count,
            sent_at: None,
        }
    }
}

/// Queue size broken down by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatusCounts {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub acknowledged: i64,
}

impl QueueStatusCounts {
    pub fn add(&mut self, status: NotificationStatus, count: i64) {
        match status {
            NotificationStatus::Pending => self.pending += count,
            NotificationStatus::Sent => self.sent += count,
            NotificationStatus::Failed => self.failed += count,
            NotificationStatus::Acknowledged => self.acknowledged += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.sent + self.failed + self.acknowledged
    }
}

const QUEUE_COLUMNS: &str = "id, match_id, target_system, notification_type, payload, status, \
                             retry_count, created_at, sent_at";

impl NotificationQueueItem {
    pub async fn create<'e, E>(executor: E, input: &CreateQueueItem) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "INSERT INTO notification_queue (match_id, target_system, notification_type, payload) \
             VALUES ($1, $2, $3, $4) RETURNING {QUEUE_COLUMNS}"
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(input.match_id)
            .bind(input.target_system.as_str())
            .bind(input.notification_type.as_str())
            .bind(&input.payload)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM notification_queue WHERE id = $1");
        sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Up to `limit` pending items, oldest first.
    pub async fn fetch_pending<'e, E>(executor: E, limit: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM notification_queue \
             WHERE status = 'pending' ORDER BY created_at ASC, id ASC LIMIT $1"
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(limit)
            .fetch_all(executor)
            .await
    }

    /// Apply `transition` if the item is still pending. Returns whether a row changed.
    pub async fn apply_transition<'e, E>(
        executor: E,
        id: Uuid,
        transition: &QueueTransition,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE notification_queue
            SET status = $2, retry_count = $3, sent_at = $4
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(id)
        .bind(transition.status.as_str())
        .bind(transition.retry_count)
        .bind(transition.sent_at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn status_counts<'e, E>(executor: E) -> Result<QueueStatusCounts, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"SELECT status, COUNT(*) FROM notification_queue GROUP BY status",
        )
        .fetch_all(executor)
        .await?;

        let mut counts = QueueStatusCounts::default();
        for (status, count) in rows {
            match status.parse::<NotificationStatus>() {
                Ok(status) => counts.add(status, count),
                Err(e) => tracing::warn!(error = %e, "Ignoring unknown queue status"),
            }
        }
        Ok(counts)
    }
}
