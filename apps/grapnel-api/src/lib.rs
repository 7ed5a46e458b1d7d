//! Grapnel API service.
//!
//! Wires the hash registry, the notification pipeline and the operational
//! endpoints into one axum application:
//!
//! - `GET /`, `GET /health`, `GET /ready`, `GET /api-docs/openapi.json`
//! - `{prefix}/hashes/*`, `{prefix}/notifications/*`, `{prefix}/audit`
//!
//! Every response carries `X-Process-Time`. Every request outside the health
//! probes counts against the per-client ceiling.

pub mod audit;
pub mod config;
pub mod cors;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod openapi;
pub mod state;

use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use grapnel_api_hashes::{hashes_router, HashesState};
use grapnel_notifications::{notifications_router, NotificationsState};

pub use config::Config;
pub use state::AppState;

/// Build the application router. `api_prefix` must start with `/`.
pub fn build_router(state: AppState, api_prefix: &str) -> Router {
    let api = Router::new()
        .merge(hashes_router(HashesState::new(
            state.hash_service.clone(),
            state.rate_limiter.clone(),
        )))
        .merge(notifications_router(NotificationsState::new(
            state.subscription_service.clone(),
            state.dispatcher.clone(),
        )))
        .merge(audit::audit_router(state.clone()));

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/ready", get(health::ready_handler))
        .route("/api-docs/openapi.json", get(openapi::openapi_handler))
        .with_state(state.clone())
        .nest(api_prefix, api)
        .layer(from_fn_with_state(
            state,
            middleware::global_rate_limit_middleware,
        ))
        .layer(from_fn(middleware::process_time_middleware))
}
