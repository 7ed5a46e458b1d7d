//! Audit trail rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: String,
    pub system_id: Option<String>,
    pub user_id: Option<String>,
    pub resource_id: Option<String>,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Input for an audit entry.
///
/// ```
/// use grapnel_db::CreateAuditLogEntry;
///
/// let entry = CreateAuditLogEntry::new("webhook_subscribe")
///     .system("trace")
///     .resource("3f0c9b1e");
/// assert_eq!(entry.system_id.as_deref(), Some("trace"));
/// ```
#[derive(Debug, Clone)]
pub struct CreateAuditLogEntry {
    pub action: String,
    pub system_id: Option<String>,
    pub user_id: Option<String>,
    pub resource_id: Option<String>,
    pub details: JsonValue,
}

impl CreateAuditLogEntry {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            system_id: None,
            user_id: None,
            resource_id: None,
            details: JsonValue::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub fn system(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    #[must_use]
    pub fn details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}

/// Filter options for listing the audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub system_id: Option<String>,
    pub action: Option<String>,
}

impl AuditLogFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        let system_ok = self
            .system_id
            .as_ref()
            .map_or(true, |s| entry.system_id.as_ref() == Some(s));
        let action_ok = self.action.as_ref().map_or(true, |a| &entry.action == a);
        system_ok && action_ok
    }
}

impl AuditLogEntry {
    pub async fn create<'e, E>(executor: E, input: &CreateAuditLogEntry) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO audit_log (action, system_id, user_id, resource_id, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, action, system_id, user_id, resource_id, details, created_at
            ",
        )
        .bind(&input.action)
        .bind(&input.system_id)
        .bind(&input.user_id)
        .bind(&input.resource_id)
        .bind(&input.details)
        .fetch_one(executor)
        .await
    }

    /// Most recent entries first.
    pub async fn list<'e, E>(
        executor: E,
        filter: &AuditLogFilter,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, action, system_id, user_id, resource_id, details, created_at
            FROM audit_log
            WHERE ($1::text IS NULL OR system_id = $1)
              AND ($2::text IS NULL OR action = $2)
            ORDER BY created_at DESC
            LIMIT $3
            ",
        )
        .bind(&filter.system_id)
        .bind(&filter.action)
        .bind(limit)
        .fetch_all(executor)
        .await
    }
}
