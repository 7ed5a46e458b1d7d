//! Fixed-window rate limiting on top of [`Cache::incr_with_expiry`].
//!
//! Each identifier gets a counter under `rate_limit:{identifier}`. The window
//! starts with the first request and is not extended by later ones. Callers
//! decide what to do when the cache itself fails; the HTTP layer fails open.

use std::sync::Arc;
use std::time::Duration;

use crate::{Cache, CacheError};

/// Default admission window.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Requests counted in the current window, including this one.
    pub count: i64,
    pub limit: i64,
    pub window: Duration,
}

impl Admission {
    /// The request is admitted while the count stays within the limit.
    pub fn allowed(&self) -> bool {
        self.count <= self.limit
    }

    pub fn remaining(&self) -> i64 {
        (self.limit - self.count).max(0)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn Cache>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            window: DEFAULT_RATE_WINDOW,
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request for `identifier` and report whether it is admitted.
    pub async fn admit(&self, identifier: &str, limit: i64) -> Result<Admission, CacheError> {
        let key = format!("rate_limit:{identifier}");
        let count = self.cache.incr_with_expiry(&key, self.window).await?;
        let admission = Admission {
            count,
            limit,
            window: self.window,
        };

        if !admission.allowed() {
            tracing::info!(
                target: "rate_limit",
                identifier = %identifier,
                count = count,
                limit = limit,
                "Rate limit exceeded"
            );
        }
        Ok(admission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;

    #[tokio::test]
    async fn test_admits_up_to_limit() {
        let limiter = RateLimiter::new(Arc::new(MemoryCache::new()));
        for expected in 1..=3 {
            let admission = limiter.admit("lookup:trace", 3).await.unwrap();
            assert_eq!(admission.count, expected);
            assert!(admission.allowed());
        }
        let fourth = limiter.admit("lookup:trace", 3).await.unwrap();
        assert!(!fourth.allowed());
        assert_eq!(fourth.remaining(), 0);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(Arc::new(MemoryCache::new()));
        assert!(limiter.admit("global:10.0.0.1", 1).await.unwrap().allowed());
        assert!(!limiter.admit("global:10.0.0.1", 1).await.unwrap().allowed());
        assert!(limiter.admit("global:10.0.0.2", 1).await.unwrap().allowed());
    }

    #[tokio::test]
    async fn test_counter_stored_under_prefixed_key() {
        let cache = Arc::new(MemoryCache::new());
        let limiter = RateLimiter::new(cache.clone());
        limiter.admit("register:grapnel", 50).await.unwrap();
        assert_eq!(
            cache.get("rate_limit:register:grapnel").await.unwrap().as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimiter::new(Arc::new(MemoryCache::new()))
            .with_window(Duration::from_millis(100));
        assert!(limiter.admit("x", 1).await.unwrap().allowed());
        assert!(!limiter.admit("x", 1).await.unwrap().allowed());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(limiter.admit("x", 1).await.unwrap().allowed());
    }
}
