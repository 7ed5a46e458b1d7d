//! Notification dispatch.
//!
//! Turns match events into queue items, and drains the queue by POSTing
//! signed envelopes to partner webhooks. Each call to
//! [`Dispatcher::process_queue`] handles one bounded batch; the worker calls it
//! on an interval.
//!
//! Retry policy: an item gets `max_attempts` delivery attempts in total. A
//! failed attempt increments `retry_count`; the item stays `pending` while
//! `retry_count < max_attempts` and becomes `failed` once it reaches it. There
//! is no backoff beyond the poll interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use grapnel_cache::{get_json, set_json, Cache};
use grapnel_core::{NotificationStatus, NotificationType, SourceSystem};
use grapnel_db::{
    CreateQueueItem, NotificationQueueItem, QueueStatusCounts, QueueTransition, Store,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::crypto::{self, SIGNATURE_HEADER};
use crate::error::{DeliveryFailure, NotificationError};
use crate::models::{MatchEvent, WebhookEnvelope};
use crate::services::subscription_service::SubscriptionService;
use crate::targeting::compute_targets;

/// Default delivery attempts per item.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Default items handled per `process_queue` call.
pub const DEFAULT_BATCH_SIZE: i64 = 10;

/// Default per-attempt HTTP timeout.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// TTL of queue item copies in the cache.
pub const QUEUE_ITEM_TTL: Duration = Duration::from_secs(3600);

pub fn queue_cache_key(id: Uuid) -> String {
    format!("notification_queue:{id}")
}

/// Tunables for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_attempts: i32,
    pub batch_size: i64,
    pub delivery_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            batch_size: DEFAULT_BATCH_SIZE,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

/// Outcome of [`Dispatcher::trigger_match`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchDispatch {
    pub match_id: Uuid,
    pub targets: Vec<SourceSystem>,
    /// Ids of the queue items created, one per successfully enqueued target.
    pub queued: Vec<Uuid>,
    pub failed_targets: Vec<SourceSystem>,
}

impl MatchDispatch {
    /// Targets that were actually enqueued.
    pub fn notified(&self) -> Vec<SourceSystem> {
        self.targets
            .iter()
            .copied()
            .filter(|t| !self.failed_targets.contains(t))
            .collect()
    }
}

/// Tally of one [`Dispatcher::process_queue`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub fetched: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    /// Items another dispatcher had already moved out of `pending`.
    pub skipped: usize,
    /// Items whose new state could not be written.
    pub errors: usize,
}

impl DispatchReport {
    fn record(&mut self, status: NotificationStatus) {
        match status {
            NotificationStatus::Sent => self.sent += 1,
            NotificationStatus::Pending => self.retried += 1,
            NotificationStatus::Failed => self.failed += 1,
            NotificationStatus::Acknowledged => {}
        }
    }
}

/// State to write after an attempt.
pub fn next_transition(
    retry_count: i32,
    delivered: bool,
    max_attempts: i32,
    now: DateTime<Utc>,
) -> QueueTransition {
    if delivered {
        return QueueTransition::sent(retry_count, now);
    }
    let attempts = retry_count.saturating_add(1);
    if attempts < max_attempts {
        QueueTransition::retry(attempts)
    } else {
        QueueTransition::failed(attempts)
    }
}

/// Build the envelope POSTed for `item`.
pub fn build_envelope(item: &NotificationQueueItem, now: DateTime<Utc>) -> WebhookEnvelope {
    WebhookEnvelope {
        event: item.notification_type,
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        data: item.payload.clone(),
        notification_id: item.id,
    }
}

/// Service for enqueueing and delivering notifications.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    subscriptions: SubscriptionService,
    http_client: Client,
    webhook_secret: Arc<str>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher with default tunables.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Internal` if the HTTP client cannot be built.
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        webhook_secret: &str,
    ) -> Result<Self, NotificationError> {
        Self::with_config(store, cache, webhook_secret, DispatchConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        webhook_secret: &str,
        config: DispatchConfig,
    ) -> Result<Self, NotificationError> {
        let http_client = Client::builder()
            .timeout(config.delivery_timeout)
            .user_agent("grapnel-notifications/1.0")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| NotificationError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            subscriptions: SubscriptionService::new(store.clone(), cache.clone()),
            store,
            cache,
            http_client,
            webhook_secret: Arc::from(webhook_secret),
            config,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Enqueueing
    // -----------------------------------------------------------------------

    /// Queue a `hash_match` notification for every target of `event`.
    ///
    /// A target whose item cannot be persisted is logged and reported in
    /// `failed_targets`; the other targets are still queued.
    pub async fn trigger_match(&self, event: &MatchEvent) -> Result<MatchDispatch, NotificationError> {
        let targets = compute_targets(
            event.new_source_system,
            event.existing_source_system,
            event.severity,
        );
        let payload = serde_json::to_value(event)
            .map_err(|e| NotificationError::Internal(format!("Failed to encode match event: {e}")))?;

        let mut dispatch = MatchDispatch {
            match_id: event.match_id,
            targets: targets.clone(),
            ..MatchDispatch::default()
        };

        for target in targets {
            match self
                .enqueue(event.match_id, target, NotificationType::HashMatch, payload.clone())
                .await
            {
                Ok(item) => dispatch.queued.push(item.id),
                Err(e) => {
                    tracing::error!(
                        target: "notification_dispatch",
                        match_id = %event.match_id,
                        target_system = %target,
                        error = %e,
                        "Failed to enqueue match notification"
                    );
                    dispatch.failed_targets.push(target);
                }
            }
        }

        tracing::info!(
            target: "notification_dispatch",
            match_id = %event.match_id,
            hash_value = %event.hash_value,
            severity = %event.severity,
            new_source = %event.new_source_system,
            queued = dispatch.queued.len(),
            failed = dispatch.failed_targets.len(),
            "Match notifications queued"
        );

        Ok(dispatch)
    }

    /// Persist a `pending` item and mirror it into the cache.
    pub async fn enqueue(
        &self,
        match_id: Uuid,
        target: SourceSystem,
        notification_type: NotificationType,
        payload: JsonValue,
    ) -> Result<NotificationQueueItem, NotificationError> {
        let item = self
            .store
            .enqueue(&CreateQueueItem {
                match_id,
                target_system: target,
                notification_type,
                payload,
            })
            .await?;

        self.mirror(&item).await;
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// A queue item: cache copy if present, else the store.
    pub async fn get_queue_item(&self, id: Uuid) -> Result<NotificationQueueItem, NotificationError> {
        match get_json::<NotificationQueueItem>(self.cache.as_ref(), &queue_cache_key(id)).await {
            Ok(Some(item)) => return Ok(item),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "cache", item_id = %id, error = %e, "Queue item cache read failed");
            }
        }

        let item = self
            .store
            .find_queue_item(id)
            .await?
            .ok_or(NotificationError::QueueItemNotFound)?;
        self.mirror(&item).await;
        Ok(item)
    }

    pub async fn queue_status(&self) -> Result<QueueStatusCounts, NotificationError> {
        Ok(self.store.queue_status_counts().await?)
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Attempt delivery of one batch of pending items.
    ///
    /// # Errors
    ///
    /// Only fails when the batch itself cannot be fetched. Per-item delivery
    /// and write failures are logged and counted in the report.
    pub async fn process_queue(&self) -> Result<DispatchReport, NotificationError> {
        let items = self.store.fetch_pending(self.config.batch_size).await?;
        let mut report = DispatchReport {
            fetched: items.len(),
            ..DispatchReport::default()
        };

        for item in items {
            let outcome = self.attempt_delivery(&item).await;
            let transition = next_transition(
                item.retry_count,
                outcome.is_ok(),
                self.config.max_attempts,
                Utc::now(),
            );

            match &outcome {
                Ok(status_code) => tracing::info!(
                    target: "notification_dispatch",
                    item_id = %item.id,
                    match_id = %item.match_id,
                    target_system = %item.target_system,
                    status_code,
                    "Notification delivered"
                ),
                Err(failure) => tracing::warn!(
                    target: "notification_dispatch",
                    item_id = %item.id,
                    match_id = %item.match_id,
                    target_system = %item.target_system,
                    retry_count = transition.retry_count,
                    next_status = %transition.status,
                    error = %failure,
                    "Notification delivery failed"
                ),
            }

            match self.store.apply_transition(item.id, &transition).await {
                Ok(true) => {
                    report.record(transition.status);
                    self.mirror(&item.with_transition(&transition)).await;
                }
                Ok(false) => {
                    tracing::debug!(
                        target: "notification_dispatch",
                        item_id = %item.id,
                        "Item already left pending, skipping update"
                    );
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(
                        target: "notification_dispatch",
                        item_id = %item.id,
                        error = %e,
                        "Failed to record delivery outcome"
                    );
                    report.errors += 1;
                }
            }
        }

        if report.fetched > 0 {
            tracing::debug!(
                target: "notification_dispatch",
                fetched = report.fetched,
                sent = report.sent,
                retried = report.retried,
                failed = report.failed,
                skipped = report.skipped,
                errors = report.errors,
                "Dispatch batch complete"
            );
        }

        Ok(report)
    }

    /// POST one item. `Ok` carries the 2xx status code.
    async fn attempt_delivery(&self, item: &NotificationQueueItem) -> Result<u16, DeliveryFailure> {
        let url = self
            .subscriptions
            .resolve_webhook_url(item.target_system)
            .await
            .map_err(|e| DeliveryFailure::Resolution(e.to_string()))?
            .ok_or(DeliveryFailure::NoSubscription(item.target_system))?;

        let envelope = build_envelope(item, Utc::now());
        let value = serde_json::to_value(&envelope)
            .map_err(|e| DeliveryFailure::Payload(e.to_string()))?;
        let body = crypto::canonical_json(&value);
        let signature = crypto::signature_header_value(&self.webhook_secret, body.as_bytes())
            .map_err(|e| DeliveryFailure::Payload(e.to_string()))?;

        let response = self
            .http_client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(DeliveryFailure::Status(status.as_u16()))
        }
    }

    async fn mirror(&self, item: &NotificationQueueItem) {
        if let Err(e) = set_json(self.cache.as_ref(), &queue_cache_key(item.id), item, QUEUE_ITEM_TTL).await {
            tracing::warn!(target: "cache", item_id = %item.id, error = %e, "Failed to mirror queue item");
        }
    }
}
