//! Grapnel Database Layer
//!
//! Persistence for the hash registry, match log, notification queue, webhook
//! subscriptions and audit trail.
//!
//! Two backends implement the [`Store`] trait:
//! - [`PgStore`]: PostgreSQL via `SQLx`, with embedded migrations
//! - [`MemoryStore`]: in-process tables for tests and local development
//!
//! Row models live in [`models`] and expose associated query functions that take
//! any `PgExecutor`, so they work against a pool or inside a transaction.

pub mod audit;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::DbError;
pub use memory::MemoryStore;
pub use migrations::run_migrations;
pub use models::{
    AuditLogEntry, AuditLogFilter, CreateAuditLogEntry, CreateHashMatch, CreateHashRecord,
    CreateQueueItem, HashMatch, HashRecord, NotificationQueueItem, QueueStatusCounts,
    QueueTransition, UpsertWebhookSubscription, WebhookSubscription, EXACT_MATCH_CONFIDENCE,
};
pub use postgres::PgStore;
pub use store::Store;
