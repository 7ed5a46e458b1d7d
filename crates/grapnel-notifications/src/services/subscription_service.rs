//! Webhook subscription registry.
//!
//! The active webhook URL for each partner is cached under
//! `webhook:{system_id}` for an hour. The store remains the source of truth;
//! cache failures are logged and otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use grapnel_cache::Cache;
use grapnel_core::SourceSystem;
use grapnel_db::{audit, CreateAuditLogEntry, Store, UpsertWebhookSubscription, WebhookSubscription};
use serde_json::json;

use crate::error::NotificationError;
use crate::models::SubscribeRequest;
use crate::validation::{
    parse_notification_types, parse_system_id, validate_filters, validate_webhook_url,
};

/// TTL of cached webhook URLs.
pub const WEBHOOK_URL_TTL: Duration = Duration::from_secs(3600);

pub fn webhook_cache_key(system: SourceSystem) -> String {
    format!("webhook:{system}")
}

/// Service for webhook subscription operations.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    /// Create or replace the subscription for a partner system.
    pub async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> Result<WebhookSubscription, NotificationError> {
        let system_id = parse_system_id(&request.system_id)?;
        validate_webhook_url(&request.webhook_url)?;
        let notification_types = parse_notification_types(request.notification_types.as_deref())?;
        let filters = validate_filters(request.filters)?;

        let subscription = self
            .store
            .upsert_subscription(&UpsertWebhookSubscription {
                system_id,
                webhook_url: request.webhook_url,
                notification_types,
                filters,
            })
            .await?;

        self.cache_url(system_id, &subscription.webhook_url).await;

        audit::record(
            self.store.as_ref(),
            CreateAuditLogEntry::new("webhook_subscribe")
                .system(system_id.as_str())
                .resource(subscription.id.to_string())
                .details(json!({
                    "webhook_url": subscription.webhook_url,
                    "notification_types": subscription.notification_types,
                })),
        )
        .await;

        tracing::info!(
            target: "notification_dispatch",
            system_id = %system_id,
            subscription_id = %subscription.id,
            "Webhook subscription registered"
        );

        Ok(subscription)
    }

    /// The active subscription for a partner system.
    pub async fn get(&self, system_id: &str) -> Result<WebhookSubscription, NotificationError> {
        let system = parse_system_id(system_id)?;
        self.store
            .find_active_subscription(system)
            .await?
            .ok_or_else(|| NotificationError::SubscriptionNotFound(system_id.to_string()))
    }

    /// Deactivate a partner's subscription. The row is kept.
    pub async fn unsubscribe(&self, system_id: &str) -> Result<(), NotificationError> {
        let system = parse_system_id(system_id)?;
        let deactivated = self.store.deactivate_subscription(system).await?;

        if let Err(e) = self.cache.delete(&webhook_cache_key(system)).await {
            tracing::warn!(target: "cache", system_id = %system, error = %e, "Failed to evict webhook URL");
        }

        if !deactivated {
            return Err(NotificationError::SubscriptionNotFound(system_id.to_string()));
        }

        audit::record(
            self.store.as_ref(),
            CreateAuditLogEntry::new("webhook_unsubscribe").system(system.as_str()),
        )
        .await;

        tracing::info!(target: "notification_dispatch", system_id = %system, "Webhook subscription deactivated");
        Ok(())
    }

    /// Webhook URL for a partner: cache, else store (repopulating the cache).
    ///
    /// After repopulating, the store is read again and the entry is evicted if
    /// the subscription was deactivated or changed in between. An unsubscribe
    /// racing this call therefore cannot leave its URL cached.
    pub async fn resolve_webhook_url(
        &self,
        system: SourceSystem,
    ) -> Result<Option<String>, NotificationError> {
        match self.cache.get(&webhook_cache_key(system)).await {
            Ok(Some(url)) => return Ok(Some(url)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "cache", system_id = %system, error = %e, "Webhook URL cache read failed");
            }
        }

        let Some(subscription) = self.store.find_active_subscription(system).await? else {
            return Ok(None);
        };
        self.cache_url(system, &subscription.webhook_url).await;

        let current = self.store.find_active_subscription(system).await?;
        if current.as_ref().map(|s| s.webhook_url.as_str()) != Some(subscription.webhook_url.as_str()) {
            tracing::debug!(
                target: "cache",
                system_id = %system,
                "Subscription changed while resolving, evicting cached URL"
            );
            if let Err(e) = self.cache.delete(&webhook_cache_key(system)).await {
                tracing::warn!(target: "cache", system_id = %system, error = %e, "Failed to evict webhook URL");
            }
        }
        Ok(current.map(|s| s.webhook_url))
    }

    async fn cache_url(&self, system: SourceSystem, url: &str) {
        if let Err(e) = self
            .cache
            .set(&webhook_cache_key(system), url.to_string(), Some(WEBHOOK_URL_TTL))
            .await
        {
            tracing::warn!(target: "cache", system_id = %system, error = %e, "Failed to cache webhook URL");
        }
    }
}
