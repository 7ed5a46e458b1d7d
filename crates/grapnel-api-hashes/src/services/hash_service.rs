//! Hash registration, lookup and statistics.
//!
//! Lookups are cache-aside under `hash_lookup:{hash_value}` for five minutes.
//! The cached result always carries metadata; it is stripped per request.
//! Registration invalidates that entry, so a lookup after a registration
//! sees the new source.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use grapnel_cache::{get_json, set_json, Cache};
use grapnel_core::{
    normalize_and_validate, validate_bounded_object, HashType, JsonBounds, MatchType, Severity,
    SourceSystem,
};
use grapnel_db::{
    audit, CreateAuditLogEntry, CreateHashMatch, CreateHashRecord, HashRecord, Store,
    EXACT_MATCH_CONFIDENCE,
};
use grapnel_notifications::{Dispatcher, MatchEvent};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::error::HashApiError;
use crate::models::{
    HashLookupRequest, HashLookupResponse, HashMatchResult, HashRegisterRequest,
    HashRegisterResponse, HashStats, RegisterOutcome, MAX_BATCH_SIZE,
};

/// TTL of cached lookup results.
pub const LOOKUP_CACHE_TTL: Duration = Duration::from_secs(300);

/// TTL of the cached registry statistics.
pub const STATS_CACHE_TTL: Duration = Duration::from_secs(300);

pub const STATS_CACHE_KEY: &str = "system_stats";

pub fn lookup_cache_key(hash_value: &str) -> String {
    format!("hash_lookup:{hash_value}")
}

/// Parse a source system id from a request.
pub fn parse_source_system(raw: &str) -> Result<SourceSystem, HashApiError> {
    raw.parse()
        .map_err(|e: grapnel_core::ParseEnumError| HashApiError::Validation(e.to_string()))
}

/// Validate and normalize one registration against its batch's source.
fn prepare_record(
    source_system: SourceSystem,
    request: HashRegisterRequest,
) -> Result<CreateHashRecord, String> {
    request.validate().map_err(|e| e.to_string())?;

    let hash_value = normalize_and_validate(&request.hash_value).map_err(|e| e.to_string())?;
    let hash_type: HashType = request.hash_type.parse().map_err(|e: grapnel_core::ParseEnumError| e.to_string())?;
    let severity = match request.severity.as_deref() {
        Some(raw) => raw.parse().map_err(|e: grapnel_core::ParseEnumError| e.to_string())?,
        None => Severity::default(),
    };
    let metadata = match request.metadata {
        None | Some(serde_json::Value::Null) => json!({}),
        Some(value) => {
            validate_bounded_object(&value, &JsonBounds::default())
                .map_err(|e| format!("metadata: {e}"))?;
            value
        }
    };

    // Tags are a set; keep first occurrences in order.
    let mut seen = HashSet::new();
    let tags = request
        .tags
        .unwrap_or_default()
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect();

    Ok(CreateHashRecord {
        hash_value,
        hash_type,
        source_system,
        source_id: request.source_id,
        severity,
        tags,
        metadata,
    })
}

/// Service for hash registry operations.
#[derive(Clone)]
pub struct HashService {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    dispatcher: Dispatcher,
}

impl HashService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            cache,
            dispatcher,
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a batch of hashes reported by `source_system`.
    ///
    /// The batch is validated as a whole: any malformed record rejects the
    /// request. Storage is then attempted per record and reported per record,
    /// except that an unreachable store fails the whole call. Records stored
    /// before the outage stay stored.
    pub async fn register_batch(
        &self,
        source_system: SourceSystem,
        requests: Vec<HashRegisterRequest>,
    ) -> Result<HashRegisterResponse, HashApiError> {
        if requests.is_empty() {
            return Err(HashApiError::Validation(
                "At least one hash must be provided".to_string(),
            ));
        }
        if requests.len() > MAX_BATCH_SIZE {
            return Err(HashApiError::Validation(format!(
                "Cannot register more than {MAX_BATCH_SIZE} hashes at once"
            )));
        }

        let records = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                prepare_record(source_system, request)
                    .map_err(|e| HashApiError::Validation(format!("hashes[{index}]: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut response = HashRegisterResponse {
            success: true,
            registered_count: 0,
            failed_count: 0,
            errors: Vec::new(),
            hash_ids: Vec::new(),
            results: Vec::with_capacity(records.len()),
        };

        for record in &records {
            let outcome = match self.register_one(record).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        target: "hash_registry",
                        source_system = %source_system,
                        registered = response.registered_count,
                        failed = response.failed_count,
                        error = %e,
                        "Store unavailable, aborting hash batch"
                    );
                    return Err(e);
                }
            };
            match (&outcome.hash_id, &outcome.error) {
                (Some(id), _) => {
                    response.registered_count += 1;
                    response.hash_ids.push(*id);
                }
                (None, Some(error)) => {
                    response.failed_count += 1;
                    response.errors.push(error.clone());
                }
                (None, None) => response.failed_count += 1,
            }
            response.results.push(outcome);
        }
        response.success = response.failed_count == 0;

        audit::record(
            self.store.as_ref(),
            CreateAuditLogEntry::new("hash_register_batch")
                .system(source_system.as_str())
                .details(json!({
                    "registered_count": response.registered_count,
                    "failed_count": response.failed_count,
                    "hash_ids": response.hash_ids,
                })),
        )
        .await;

        tracing::info!(
            target: "hash_registry",
            source_system = %source_system,
            registered = response.registered_count,
            failed = response.failed_count,
            "Hash batch registered"
        );

        Ok(response)
    }

    /// Store one record and run match detection for it.
    ///
    /// A store that cannot be reached aborts the batch. Any other store error
    /// fails this record only. Nothing is inserted unless the existing
    /// registrations were read, so a retried record still detects its match.
    async fn register_one(&self, record: &CreateHashRecord) -> Result<RegisterOutcome, HashApiError> {
        let mut outcome = RegisterOutcome {
            hash_value: record.hash_value.clone(),
            hash_id: None,
            error: None,
            match_id: None,
            systems_notified: Vec::new(),
        };

        let existing = match self.store.find_hashes(&record.hash_value).await {
            Ok(rows) => rows,
            Err(e) if e.is_unavailable() => return Err(e.into()),
            Err(e) => {
                tracing::error!(
                    target: "hash_registry",
                    hash_value = %record.hash_value,
                    error = %e,
                    "Failed to read existing registrations"
                );
                outcome.error = Some(format!("Failed to register hash {}: {e}", record.hash_value));
                return Ok(outcome);
            }
        };

        let inserted = match self.store.insert_hash(record).await {
            Ok(inserted) => inserted,
            Err(e) if e.is_unavailable() => return Err(e.into()),
            Err(e) => {
                tracing::error!(
                    target: "hash_registry",
                    hash_value = %record.hash_value,
                    error = %e,
                    "Failed to register hash"
                );
                outcome.error = Some(format!("Failed to register hash {}: {e}", record.hash_value));
                return Ok(outcome);
            }
        };
        outcome.hash_id = Some(inserted.id);

        self.invalidate_lookup(&record.hash_value).await;

        // The earliest report from another partner is the match.
        if let Some(matched) = existing
            .iter()
            .find(|r| r.source_system != record.source_system)
        {
            if let Some((match_id, notified)) = self.handle_match(&inserted, matched).await {
                outcome.match_id = Some(match_id);
                outcome.systems_notified = notified;
            }
        }

        Ok(outcome)
    }

    /// Queue notifications for a match and record it. Failures are logged and
    /// never fail the registration.
    async fn handle_match(
        &self,
        inserted: &HashRecord,
        matched: &HashRecord,
    ) -> Option<(Uuid, Vec<SourceSystem>)> {
        let event = MatchEvent {
            match_id: Uuid::new_v4(),
            hash_value: inserted.hash_value.clone(),
            hash_type: inserted.hash_type,
            new_source_system: inserted.source_system,
            existing_source_system: Some(matched.source_system),
            severity: inserted.severity,
            new_hash_id: Some(inserted.id),
            matched_hash_id: Some(matched.id),
            match_type: MatchType::Exact,
            confidence_score: EXACT_MATCH_CONFIDENCE,
            detected_at: Utc::now(),
        };

        let dispatch = match self.dispatcher.trigger_match(&event).await {
            Ok(dispatch) => dispatch,
            Err(e) => {
                tracing::error!(
                    target: "hash_registry",
                    match_id = %event.match_id,
                    error = %e,
                    "Failed to dispatch match notifications"
                );
                return None;
            }
        };
        let notified = dispatch.notified();

        let record = CreateHashMatch {
            id: event.match_id,
            hash_value: event.hash_value.clone(),
            hash_type: event.hash_type,
            source_system: event.new_source_system,
            matched_system: matched.source_system,
            primary_hash_id: Some(inserted.id),
            matched_hash_id: Some(matched.id),
            match_type: event.match_type,
            confidence_score: event.confidence_score,
            severity: event.severity,
            systems_notified: notified.clone(),
        };
        if let Err(e) = self.store.insert_match(&record).await {
            tracing::error!(
                target: "hash_registry",
                match_id = %event.match_id,
                error = %e,
                "Failed to record hash match"
            );
        }

        tracing::info!(
            target: "hash_registry",
            match_id = %event.match_id,
            hash_value = %event.hash_value,
            new_source = %event.new_source_system,
            matched_source = %matched.source_system,
            severity = %event.severity,
            "Cross-partner match detected"
        );

        Some((event.match_id, notified))
    }

    async fn invalidate_lookup(&self, hash_value: &str) {
        if let Err(e) = self.cache.delete(&lookup_cache_key(hash_value)).await {
            tracing::warn!(target: "cache", hash_value = %hash_value, error = %e, "Failed to invalidate lookup cache");
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Look up a batch of hashes, one result per requested hash in order.
    pub async fn lookup_many(
        &self,
        request: HashLookupRequest,
    ) -> Result<HashLookupResponse, HashApiError> {
        let started = Instant::now();
        request
            .validate()
            .map_err(|e| HashApiError::Validation(e.to_string()))?;

        let hashes = request
            .hashes
            .iter()
            .map(|h| normalize_and_validate(h).map_err(|e| HashApiError::Validation(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut matches = Vec::with_capacity(hashes.len());
        let mut cached = false;
        for hash in hashes {
            let (result, hit) = self.lookup_normalized(hash).await?;
            cached |= hit;
            matches.push(if request.include_metadata {
                result
            } else {
                result.without_metadata()
            });
        }

        Ok(HashLookupResponse {
            total_matches: matches.iter().filter(|m| m.found).count(),
            matches,
            query_time: started.elapsed().as_secs_f64(),
            cached,
        })
    }

    /// Look up one hash value, metadata included.
    pub async fn lookup(&self, hash_value: &str) -> Result<HashMatchResult, HashApiError> {
        let hash = normalize_and_validate(hash_value)
            .map_err(|e| HashApiError::Validation(e.to_string()))?;
        Ok(self.lookup_normalized(hash).await?.0)
    }

    /// The aggregated result and whether it came from the cache.
    async fn lookup_normalized(&self, hash: String) -> Result<(HashMatchResult, bool), HashApiError> {
        let key = lookup_cache_key(&hash);
        match get_json::<HashMatchResult>(self.cache.as_ref(), &key).await {
            Ok(Some(result)) => return Ok((result, true)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "cache", hash_value = %hash, error = %e, "Lookup cache read failed");
            }
        }

        let records = self.store.find_hashes(&hash).await?;
        let result = HashMatchResult::from_records(hash, records);

        if let Err(e) = set_json(self.cache.as_ref(), &key, &result, LOOKUP_CACHE_TTL).await {
            tracing::warn!(target: "cache", hash_value = %result.hash, error = %e, "Failed to cache lookup result");
        }
        Ok((result, false))
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub async fn stats(&self) -> Result<HashStats, HashApiError> {
        match get_json::<HashStats>(self.cache.as_ref(), STATS_CACHE_KEY).await {
            Ok(Some(stats)) => return Ok(stats),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "cache", error = %e, "Stats cache read failed");
            }
        }

        let now = Utc::now();
        let stats = HashStats {
            total_hashes: self.store.count_hashes().await?,
            recent_matches: self
                .store
                .count_matches_since(now - chrono::Duration::hours(24))
                .await?,
            systems_connected: self.store.count_distinct_sources().await?,
            last_updated: now,
        };

        if let Err(e) = set_json(self.cache.as_ref(), STATS_CACHE_KEY, &stats, STATS_CACHE_TTL).await {
            tracing::warn!(target: "cache", error = %e, "Failed to cache stats");
        }
        Ok(stats)
    }
}
