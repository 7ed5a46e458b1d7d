//! Router configuration for the Hash Registry API.

use axum::{
    routing::{get, post},
    Router,
};
use grapnel_cache::RateLimiter;

use crate::handlers::{lookup_handler, register_handler, stats_handler};
use crate::services::hash_service::HashService;

/// Shared state for hash handlers.
#[derive(Clone)]
pub struct HashesState {
    pub hash_service: HashService,
    /// Per-source admission control.
    pub rate_limiter: RateLimiter,
}

impl HashesState {
    pub fn new(hash_service: HashService, rate_limiter: RateLimiter) -> Self {
        Self {
            hash_service,
            rate_limiter,
        }
    }
}

/// Create the hash registry router.
pub fn hashes_router(state: HashesState) -> Router {
    Router::new()
        .route("/hashes/lookup", post(lookup_handler))
        .route("/hashes/register", post(register_handler))
        .route("/hashes/stats", get(stats_handler))
        .with_state(state)
}
