//! Request and response models for the Hash Registry API.

use chrono::{DateTime, Utc};
use grapnel_core::{MatchType, Severity, SourceSystem};
use grapnel_db::HashRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Largest batch accepted by lookup and registration.
pub const MAX_BATCH_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Look up a batch of hashes.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct HashLookupRequest {
    /// Hash values; trimmed and lower-cased before lookup.
    #[validate(length(min = 1, max = 100))]
    pub hashes: Vec<String>,

    /// The partner performing the lookup.
    pub source_system: String,

    /// Include each source's metadata in the response.
    #[serde(default)]
    pub include_metadata: bool,
}

/// One partner's report of a hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SourceEntry {
    pub system: SourceSystem,
    /// The partner's own identifier for the item.
    pub id: String,
    pub hash_id: Uuid,
    pub severity: Severity,
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<JsonValue>,
}

impl From<HashRecord> for SourceEntry {
    fn from(r: HashRecord) -> Self {
        Self {
            system: r.source_system,
            id: r.source_id,
            hash_id: r.id,
            severity: r.severity,
            tags: r.tags,
            timestamp: r.created_at,
            metadata: Some(r.metadata),
        }
    }
}

/// Every partner report for one hash value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HashMatchResult {
    pub hash: String,
    pub found: bool,
    pub sources: Vec<SourceEntry>,
    pub highest_severity: Option<Severity>,
    pub confidence_score: Option<f64>,
    pub match_type: Option<MatchType>,
}

impl HashMatchResult {
    pub fn not_found(hash: String) -> Self {
        Self {
            hash,
            found: false,
            sources: Vec::new(),
            highest_severity: None,
            confidence_score: None,
            match_type: None,
        }
    }

    /// Aggregate the registry rows for `hash`, in registration order.
    pub fn from_records(hash: String, records: Vec<HashRecord>) -> Self {
        if records.is_empty() {
            return Self::not_found(hash);
        }
        let highest_severity = records.iter().map(|r| r.severity).max();
        Self {
            hash,
            found: true,
            sources: records.into_iter().map(SourceEntry::from).collect(),
            highest_severity,
            confidence_score: Some(grapnel_db::EXACT_MATCH_CONFIDENCE),
            match_type: Some(MatchType::Exact),
        }
    }

    #[must_use]
    pub fn without_metadata(mut self) -> Self {
        for source in &mut self.sources {
            source.metadata = None;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HashLookupResponse {
    pub matches: Vec<HashMatchResult>,
    /// Number of hashes that were found.
    pub total_matches: usize,
    /// Seconds spent serving the lookup.
    pub query_time: f64,
    /// Whether any result came from the cache.
    pub cached: bool,
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// A hash reported by a partner.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct HashRegisterRequest {
    /// 8 to 64 characters after trimming.
    pub hash_value: String,

    /// One of `SHA256`, `MD5`, `PHASH`.
    pub hash_type: String,

    #[validate(length(min = 1, max = 255))]
    pub source_id: String,

    /// Defaults to `medium`.
    pub severity: Option<String>,

    pub tags: Option<Vec<String>>,

    #[schema(value_type = Option<Object>)]
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegisterQuery {
    /// The partner registering the batch.
    pub source_system: String,
}

/// Outcome for one record of a registration batch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterOutcome {
    pub hash_value: String,
    pub hash_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the registration matched another partner's report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub systems_notified: Vec<SourceSystem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HashRegisterResponse {
    /// True when every record was stored.
    pub success: bool,
    pub registered_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
    pub hash_ids: Vec<Uuid>,
    pub results: Vec<RegisterOutcome>,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HashStats {
    pub total_hashes: i64,
    /// Matches detected in the last 24 hours.
    pub recent_matches: i64,
    /// Partners that have registered at least one hash.
    pub systems_connected: i64,
    pub last_updated: DateTime<Utc>,
}
