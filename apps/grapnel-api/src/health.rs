//! Liveness, readiness and banner endpoints.

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

const CACHE_PROBE_KEY: &str = "health_check_test";

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentStatus {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                status: "healthy".to_string(),
                error: None,
            },
            Err(e) => Self {
                status: "unhealthy".to_string(),
                error: Some(e.to_string()),
            },
        }
    }

    fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Components {
    pub database: ComponentStatus,
    pub cache: ComponentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    pub components: Components,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BannerResponse {
    pub service: String,
    pub version: String,
    pub status: String,
    pub docs: String,
}

/// Round-trip a value through the cache.
async fn probe_cache(state: &AppState) -> Result<(), String> {
    let cache = state.cache.as_ref();
    cache
        .set(CACHE_PROBE_KEY, "ok".to_string(), Some(Duration::from_secs(10)))
        .await
        .map_err(|e| e.to_string())?;
    let value = cache.get(CACHE_PROBE_KEY).await.map_err(|e| e.to_string())?;
    let _ = cache.delete(CACHE_PROBE_KEY).await;
    match value.as_deref() {
        Some("ok") => Ok(()),
        _ => Err("cache probe value mismatch".to_string()),
    }
}

/// Store and cache health.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "All components healthy", body = HealthResponse),
        (status = 503, description = "At least one component unhealthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = ComponentStatus::from_result(state.store.ping().await);
    let cache = ComponentStatus::from_result(probe_cache(&state).await);
    let healthy = database.is_healthy() && cache.is_healthy();

    if !healthy {
        tracing::warn!(
            database = %database.status,
            cache = %cache.status,
            "Health check degraded"
        );
    }

    let response = HealthResponse {
        status: (if healthy { "healthy" } else { "degraded" }).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
        components: Components { database, cache },
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Whether the service should receive traffic.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready", body = ReadinessResponse),
        (status = 503, description = "Not ready or shutting down", body = ReadinessResponse),
    )
)]
pub async fn ready_handler(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    if state.is_shutting_down() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                reason: Some("shutting down".to_string()),
            }),
        );
    }

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                reason: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                reason: Some(e.to_string()),
            }),
        ),
    }
}

pub async fn root_handler() -> Json<BannerResponse> {
    Json(BannerResponse {
        service: "Grapnel Hash Intelligence Exchange".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        docs: "/api-docs/openapi.json".to_string(),
    })
}
