//! Hash registry rows.
//!
//! A record is one partner's registration of one hash value. The registry is
//! append-only: the same normalized value may appear once per registration.

use chrono::{DateTime, Utc};
use grapnel_core::{HashType, Severity, SourceSystem};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A registered hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HashRecord {
    pub id: Uuid,
    /// Normalized (trimmed, lowercased) hash value.
    pub hash_value: String,
    #[sqlx(try_from = "String")]
    pub hash_type: HashType,
    #[sqlx(try_from = "String")]
    pub source_system: SourceSystem,
    /// The partner's own identifier for the item.
    pub source_id: String,
    #[sqlx(rename = "severity_level", try_from = "String")]
    pub severity: Severity,
    #[sqlx(json)]
    pub tags: Vec<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a hash. `hash_value` must already be normalized.
#[derive(Debug, Clone)]
pub struct CreateHashRecord {
    pub hash_value: String,
    pub hash_type: HashType,
    pub source_system: SourceSystem,
    pub source_id: String,
    pub severity: Severity,
    pub tags: Vec<String>,
    pub metadata: JsonValue,
}

impl HashRecord {
    /// Insert a new registration.
    pub async fn create<'e, E>(executor: E, input: &CreateHashRecord) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO hash_registry
                (hash_value, hash_type, source_system, source_id, severity_level, tags, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, hash_value, hash_type, source_system, source_id, severity_level,
                      tags, metadata, created_at
            ",
        )
        .bind(&input.hash_value)
        .bind(input.hash_type.as_str())
        .bind(input.source_system.as_str())
        .bind(&input.source_id)
        .bind(input.severity.as_str())
        .bind(Json(&input.tags))
        .bind(&input.metadata)
        .fetch_one(executor)
        .await
    }

    /// All registrations of a normalized value, oldest first.
    pub async fn find_by_value<'e, E>(
        executor: E,
        hash_value: &str,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, hash_value, hash_type, source_system, source_id, severity_level,
                   tags, metadata, created_at
            FROM hash_registry
            WHERE hash_value = $1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(hash_value)
        .fetch_all(executor)
        .await
    }

    /// Total number of registrations.
    pub async fn count<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(r"SELECT COUNT(*) FROM hash_registry")
            .fetch_one(executor)
            .await
    }

    /// Number of distinct partner systems that have registered anything.
    pub async fn count_distinct_sources<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(r"SELECT COUNT(DISTINCT source_system) FROM hash_registry")
            .fetch_one(executor)
            .await
    }
}
