//! Audit trail listing.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use grapnel_db::{AuditLogEntry, AuditLogFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const DEFAULT_AUDIT_LIMIT: i64 = 100;
pub const MAX_AUDIT_LIMIT: i64 = 500;

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    pub system_id: Option<String>,
    pub action: Option<String>,
    /// 1 to 500, default 100.
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditEntryResponse {
    pub id: Uuid,
    pub action: String,
    pub system_id: Option<String>,
    pub user_id: Option<String>,
    pub resource_id: Option<String>,
    #[schema(value_type = Object)]
    pub details: JsonValue,
    pub timestamp: DateTime<Utc>,
}

impl From<AuditLogEntry> for AuditEntryResponse {
    fn from(e: AuditLogEntry) -> Self {
        Self {
            id: e.id,
            action: e.action,
            system_id: e.system_id,
            user_id: e.user_id,
            resource_id: e.resource_id,
            details: e.details,
            timestamp: e.created_at,
        }
    }
}

/// Audit entries, newest first.
#[utoipa::path(
    get,
    path = "/audit",
    tag = "Audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = Vec<AuditEntryResponse>),
        (status = 400, description = "Invalid limit", body = grapnel_notifications::ErrorResponse),
    )
)]
pub async fn list_audit_handler(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntryResponse>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    if !(1..=MAX_AUDIT_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_AUDIT_LIMIT}"
        )));
    }

    let filter = AuditLogFilter {
        system_id: query.system_id,
        action: query.action,
    };
    let entries = state.store.list_audit(&filter, limit).await?;
    Ok(Json(entries.into_iter().map(AuditEntryResponse::from).collect()))
}

pub fn audit_router(state: AppState) -> Router {
    Router::new()
        .route("/audit", get(list_audit_handler))
        .with_state(state)
}
