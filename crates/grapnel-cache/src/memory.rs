//! moka-backed [`Cache`].

use std::future::ready;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;

use crate::{Cache, CacheError};

const DEFAULT_MAX_CAPACITY: u64 = 100_000;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    ttl: Option<Duration>,
    /// Set by increments so the expiry chosen at creation survives updates.
    keep_ttl: bool,
}

struct SlotExpiry;

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(&self, _key: &String, value: &Slot, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Slot,
        _updated_at: Instant,
        duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        if value.keep_ttl {
            duration_until_expiry
        } else {
            value.ttl
        }
    }
}

/// In-process cache with per-entry TTLs.
#[derive(Clone)]
pub struct MemoryCache {
    inner: MokaCache<String, Slot>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(SlotExpiry)
            .build();
        Self { inner }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.inner.get(key).await.map(|slot| slot.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let slot = Slot {
            value,
            ttl,
            keep_ttl: false,
        };
        self.inner.insert(key.to_owned(), slot).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.inner.remove(key).await.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.inner.contains_key(key))
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<i64, CacheError> {
        let result = self
            .inner
            .entry(key.to_owned())
            .and_compute_with(|existing| {
                let op = match existing {
                    None => Op::Put(Slot {
                        value: "1".to_string(),
                        ttl: Some(window),
                        keep_ttl: false,
                    }),
                    Some(entry) => {
                        let slot = entry.into_value();
                        match slot.value.parse::<i64>() {
                            Ok(count) => Op::Put(Slot {
                                value: count.saturating_add(1).to_string(),
                                ttl: slot.ttl,
                                keep_ttl: true,
                            }),
                            Err(_) => Op::Nop,
                        }
                    }
                };
                ready(op)
            })
            .await;

        let not_an_integer = || CacheError::NotAnInteger {
            key: key.to_string(),
        };
        match result {
            CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) => {
                entry.into_value().value.parse().map_err(|_| not_an_integer())
            }
            _ => Err(not_an_integer()),
        }
    }
}
