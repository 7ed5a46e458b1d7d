//! Grapnel Notifications
//!
//! Everything that happens after a cross-partner match is detected:
//!
//! - **Targeting**: severity-gated fan-out deciding which partners hear about a match
//! - **Queue**: durable `pending` items mirrored into the cache for fast reads
//! - **Delivery**: HMAC-SHA256 signed webhook POSTs with bounded retries
//! - **Subscriptions**: one webhook endpoint per partner system
//! - **Worker**: background loop draining the queue on a fixed interval
//!
//! Delivery is at-least-once. Racing dispatchers may deliver the same item
//! twice; receivers deduplicate on `notification_id`.

pub mod crypto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod targeting;
pub mod validation;
pub mod worker;

pub use error::{ApiResult, DeliveryFailure, ErrorResponse, NotificationError};
pub use models::{MatchEvent, WebhookEnvelope};
pub use router::{notifications_router, NotificationsState};
pub use services::dispatcher::{DispatchReport, Dispatcher, MatchDispatch};
pub use services::subscription_service::SubscriptionService;
pub use targeting::compute_targets;
pub use worker::{NotificationWorker, WorkerConfig};
