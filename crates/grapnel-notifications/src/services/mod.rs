//! Notification services.

pub mod dispatcher;
pub mod subscription_service;
