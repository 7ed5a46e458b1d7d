//! Hash lookup, registration and stats handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use grapnel_cache::RateLimiter;

use crate::error::{ApiResult, HashApiError};
use crate::models::{
    HashLookupRequest, HashLookupResponse, HashRegisterRequest, HashRegisterResponse, HashStats,
    RegisterQuery,
};
use crate::router::HashesState;
use crate::services::hash_service::parse_source_system;

/// Lookups per source system per window.
pub const LOOKUP_RATE_LIMIT: i64 = 100;

/// Registration requests per source system per window.
pub const REGISTER_RATE_LIMIT: i64 = 50;

/// Count a request against `identifier`. Admits when the limiter's cache is
/// unavailable.
async fn enforce_rate_limit(
    limiter: &RateLimiter,
    identifier: &str,
    limit: i64,
    reason: &str,
) -> ApiResult<()> {
    match limiter.admit(identifier, limit).await {
        Ok(admission) if admission.allowed() => Ok(()),
        Ok(admission) => Err(HashApiError::RateLimited {
            reason: reason.to_string(),
            retry_after_secs: admission.window.as_secs(),
        }),
        Err(e) => {
            tracing::warn!(
                target: "rate_limit",
                identifier = %identifier,
                error = %e,
                "Rate limiter unavailable, admitting request"
            );
            Ok(())
        }
    }
}

/// Look up hashes across every partner.
#[utoipa::path(
    post,
    path = "/hashes/lookup",
    tag = "Hashes",
    request_body = HashLookupRequest,
    responses(
        (status = 200, description = "Lookup results", body = HashLookupResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::error::ErrorResponse),
    )
)]
pub async fn lookup_handler(
    State(state): State<HashesState>,
    Json(request): Json<HashLookupRequest>,
) -> ApiResult<Json<HashLookupResponse>> {
    let source = parse_source_system(&request.source_system)?;
    enforce_rate_limit(
        &state.rate_limiter,
        &format!("lookup:{source}"),
        LOOKUP_RATE_LIMIT,
        "Rate limit exceeded. Try again later.",
    )
    .await?;

    let response = state.hash_service.lookup_many(request).await?;
    Ok(Json(response))
}

/// Register a batch of hashes for a partner.
#[utoipa::path(
    post,
    path = "/hashes/register",
    tag = "Hashes",
    params(RegisterQuery),
    request_body = Vec<HashRegisterRequest>,
    responses(
        (status = 200, description = "Per-record registration outcomes", body = HashRegisterResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::error::ErrorResponse),
    )
)]
pub async fn register_handler(
    State(state): State<HashesState>,
    Query(query): Query<RegisterQuery>,
    Json(hashes): Json<Vec<HashRegisterRequest>>,
) -> ApiResult<Json<HashRegisterResponse>> {
    let source = parse_source_system(&query.source_system)?;
    enforce_rate_limit(
        &state.rate_limiter,
        &format!("register:{source}"),
        REGISTER_RATE_LIMIT,
        "Rate limit exceeded for hash registration. Try again later.",
    )
    .await?;

    let response = state.hash_service.register_batch(source, hashes).await?;
    Ok(Json(response))
}

/// Registry statistics.
#[utoipa::path(
    get,
    path = "/hashes/stats",
    tag = "Hashes",
    responses(
        (status = 200, description = "Registry statistics", body = HashStats),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorResponse),
    )
)]
pub async fn stats_handler(State(state): State<HashesState>) -> ApiResult<Json<HashStats>> {
    Ok(Json(state.hash_service.stats().await?))
}
