//! Shared application state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use grapnel_api_hashes::HashService;
use grapnel_cache::{Cache, RateLimiter};
use grapnel_db::Store;
use grapnel_notifications::services::dispatcher::DispatchConfig;
use grapnel_notifications::{Dispatcher, NotificationError, SubscriptionService};

use crate::config::Config;

/// Components shared by every handler and the notification worker.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn Cache>,
    pub rate_limiter: RateLimiter,
    /// Requests per client per window across the whole API.
    pub global_rate_limit: i64,
    pub dispatcher: Dispatcher,
    pub subscription_service: SubscriptionService,
    pub hash_service: HashService,
    shutting_down: Arc<AtomicBool>,
    started_at: Instant,
}

impl AppState {
    /// Wire every component over the given backends.
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        config: &Config,
    ) -> Result<Self, NotificationError> {
        let dispatcher = Dispatcher::with_config(
            store.clone(),
            cache.clone(),
            &config.webhook_secret,
            DispatchConfig {
                max_attempts: config.max_retry_attempts,
                batch_size: config.dispatch_batch_size,
                delivery_timeout: config.webhook_timeout,
            },
        )?;

        Ok(Self {
            rate_limiter: RateLimiter::new(cache.clone()),
            global_rate_limit: config.rate_limit_per_minute,
            subscription_service: SubscriptionService::new(store.clone(), cache.clone()),
            hash_service: HashService::new(store.clone(), cache.clone(), dispatcher.clone()),
            dispatcher,
            store,
            cache,
            shutting_down: Arc::new(AtomicBool::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Flag shared with the shutdown signal handler.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutting_down.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
