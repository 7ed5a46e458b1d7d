//! Webhook subscription rows.
//!
//! At most one row exists per partner system. Subscribing again replaces the
//! endpoint in place; unsubscribing clears `active` and keeps the row.

use chrono::{DateTime, Utc};
use grapnel_core::{NotificationType, SourceSystem};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WebhookSubscription {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub system_id: SourceSystem,
    pub webhook_url: String,
    #[sqlx(json)]
    pub notification_types: Vec<NotificationType>,
    pub filters: JsonValue,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertWebhookSubscription {
    pub system_id: SourceSystem,
    pub webhook_url: String,
    pub notification_types: Vec<NotificationType>,
    pub filters: JsonValue,
}

impl WebhookSubscription {
    /// Create the system's subscription, or replace it and mark it active.
    pub async fn upsert<'e, E>(
        executor: E,
        input: &UpsertWebhookSubscription,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO webhook_subscriptions (system_id, webhook_url, notification_types, filters)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (system_id) DO UPDATE
            SET webhook_url = EXCLUDED.webhook_url,
                notification_types = EXCLUDED.notification_types,
                filters = EXCLUDED.filters,
                active = TRUE,
                updated_at = NOW()
            RETURNING id, system_id, webhook_url, notification_types, filters, active,
                      created_at, updated_at
            ",
        )
        .bind(input.system_id.as_str())
        .bind(&input.webhook_url)
        .bind(Json(&input.notification_types))
        .bind(&input.filters)
        .fetch_one(executor)
        .await
    }

    pub async fn find_active<'e, E>(
        executor: E,
        system_id: SourceSystem,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, system_id, webhook_url, notification_types, filters, active,
                   created_at, updated_at
            FROM webhook_subscriptions
            WHERE system_id = $1 AND active = TRUE
            ",
        )
        .bind(system_id.as_str())
        .fetch_optional(executor)
        .await
    }

    /// Soft-delete. Returns whether an active subscription existed.
    pub async fn deactivate<'e, E>(executor: E, system_id: SourceSystem) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE webhook_subscriptions
            SET active = FALSE, updated_at = NOW()
            WHERE system_id = $1 AND active = TRUE
            ",
        )
        .bind(system_id.as_str())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
