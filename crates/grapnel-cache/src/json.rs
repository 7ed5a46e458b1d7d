//! Typed JSON helpers over [`Cache`].

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Cache, CacheError};

/// Read and deserialize a cached JSON value.
pub async fn get_json<T>(cache: &dyn Cache, key: &str) -> Result<Option<T>, CacheError>
where
    T: DeserializeOwned,
{
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and cache a value with a TTL.
pub async fn set_json<T>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError>
where
    T: Serialize + Sync + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    cache.set(key, raw, Some(ttl)).await
}
