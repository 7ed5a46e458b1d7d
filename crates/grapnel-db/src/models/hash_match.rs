//! Cross-partner match log.

use chrono::{DateTime, Utc};
use grapnel_core::{HashType, MatchType, Severity, SourceSystem};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Confidence recorded for exact matches.
pub const EXACT_MATCH_CONFIDENCE: f64 = 1.0;

/// A match detected when a partner registers a value another partner already holds.
///
/// `id` doubles as the `match_id` carried by every queue item the match spawned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HashMatch {
    pub id: Uuid,
    pub hash_value: String,
    #[sqlx(try_from = "String")]
    pub hash_type: HashType,
    /// System that registered the new record.
    #[sqlx(try_from = "String")]
    pub source_system: SourceSystem,
    /// System that held the earlier record.
    #[sqlx(try_from = "String")]
    pub matched_system: SourceSystem,
    /// The newly registered record.
    pub primary_hash_id: Option<Uuid>,
    /// The earlier record from another source.
    pub matched_hash_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub match_type: MatchType,
    pub confidence_score: f64,
    #[sqlx(rename = "severity_level", try_from = "String")]
    pub severity: Severity,
    #[sqlx(json)]
    pub systems_notified: Vec<SourceSystem>,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateHashMatch {
    pub id: Uuid,
    pub hash_value: String,
    pub hash_type: HashType,
    pub source_system: SourceSystem,
    pub matched_system: SourceSystem,
    pub primary_hash_id: Option<Uuid>,
    pub matched_hash_id: Option<Uuid>,
    pub match_type: MatchType,
    pub confidence_score: f64,
    pub severity: Severity,
    pub systems_notified: Vec<SourceSystem>,
}

impl HashMatch {
    pub async fn create<'e, E>(executor: E, input: &CreateHashMatch) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO hash_matches
                (id, hash_value, hash_type, source_system, matched_system, primary_hash_id,
                 matched_hash_id, match_type, confidence_score, severity_level, systems_notified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, hash_value, hash_type, source_system, matched_system, primary_hash_id,
                      matched_hash_id, match_type, confidence_score, severity_level,
                      systems_notified, detected_at
            ",
        )
        .bind(input.id)
        .bind(&input.hash_value)
        .bind(input.hash_type.as_str())
        .bind(input.source_system.as_str())
        .bind(input.matched_system.as_str())
        .bind(input.primary_hash_id)
        .bind(input.matched_hash_id)
        .bind(input.match_type.as_str())
        .bind(input.confidence_score)
        .bind(input.severity.as_str())
        .bind(Json(&input.systems_notified))
        .fetch_one(executor)
        .await
    }

    /// Matches detected at or after `since`.
    pub async fn count_since<'e, E>(executor: E, since: DateTime<Utc>) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(r"SELECT COUNT(*) FROM hash_matches WHERE detected_at >= $1")
            .bind(since)
            .fetch_one(executor)
            .await
    }
}
