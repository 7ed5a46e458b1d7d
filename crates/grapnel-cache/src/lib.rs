//! Grapnel Cache
//!
//! An ephemeral key-value store with per-entry TTLs and an atomic
//! increment-with-expiry primitive, plus the window rate limiter built on it.
//!
//! The cache is only ever an accelerator: every caller treats a miss and a
//! cache error the same way and falls back to the durable store.

pub mod error;
pub mod json;
pub mod memory;
pub mod rate_limit;

use std::time::Duration;

use async_trait::async_trait;

pub use error::CacheError;
pub use json::{get_json, set_json};
pub use memory::MemoryCache;
pub use rate_limit::{Admission, RateLimiter, DEFAULT_RATE_WINDOW};

/// Key-value cache contract.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value`, replacing any previous value and TTL. `None` never expires.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Atomically increment an integer counter, creating it at 1.
    ///
    /// `window` becomes the key's TTL only when the increment creates the key;
    /// later increments keep the original expiry.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<i64, CacheError>;
}
