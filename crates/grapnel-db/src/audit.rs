//! Best-effort audit recording.

use crate::models::CreateAuditLogEntry;
use crate::store::Store;

/// Record an audit entry, logging instead of failing when the store rejects it.
pub async fn record(store: &dyn Store, entry: CreateAuditLogEntry) {
    if let Err(e) = store.insert_audit(&entry).await {
        tracing::warn!(
            target: "audit",
            action = %entry.action,
            system_id = ?entry.system_id,
            error = %e,
            "Failed to record audit entry"
        );
    }
}
