//! HTTP handlers for notification endpoints.

pub mod queue;
pub mod subscriptions;
