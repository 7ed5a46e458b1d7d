//! Common test utilities for grapnel-api-hashes integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use grapnel_api_hashes::models::HashRegisterRequest;
use grapnel_api_hashes::{hashes_router, HashService, HashesState};
use grapnel_cache::{Cache, CacheError, MemoryCache, RateLimiter};
use chrono::{DateTime, Utc};
use grapnel_core::{NotificationType, SourceSystem};
use grapnel_db::{
    AuditLogEntry, AuditLogFilter, CreateAuditLogEntry, CreateHashMatch, CreateHashRecord,
    CreateQueueItem, DbError, HashMatch, HashRecord, MemoryStore, NotificationQueueItem,
    QueueStatusCounts, QueueTransition, Store, UpsertWebhookSubscription, WebhookSubscription,
};
use grapnel_notifications::Dispatcher;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "grapnel_test_shared_secret";

/// A cache whose every operation fails.
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("cache offline".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("cache offline".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("cache offline".into()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("cache offline".into()))
    }

    async fn incr_with_expiry(&self, _key: &str, _window: Duration) -> Result<i64, CacheError> {
        Err(CacheError::Unavailable("cache offline".into()))
    }
}

/// Failures injected into the hash registry calls of a [`FaultyStore`].
#[derive(Default)]
pub struct StoreFaults {
    /// `insert_hash` for this value fails with a query error.
    pub reject_hash: Mutex<Option<String>>,
    /// The next N `insert_hash` calls fail as unreachable.
    pub insert_outages: AtomicU32,
    /// The next N `find_hashes` calls fail as unreachable.
    pub find_outages: AtomicU32,
    /// The next N `find_hashes` calls fail with a query error.
    pub find_errors: AtomicU32,
}

impl StoreFaults {
    pub fn reject(&self, hash_value: &str) {
        *self.reject_hash.lock().unwrap() = Some(hash_value.to_string());
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn unreachable_store() -> DbError {
    DbError::Unavailable("connection refused".into())
}

fn query_error(message: &str) -> DbError {
    DbError::QueryFailed(sqlx::Error::Protocol(message.into()))
}

/// A [`MemoryStore`] whose hash registry calls can be made to fail.
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Arc<StoreFaults>,
}

#[async_trait]
impl Store for FaultyStore {
    async fn insert_hash(&self, input: &CreateHashRecord) -> Result<HashRecord, DbError> {
        if StoreFaults::take(&self.faults.insert_outages) {
            return Err(unreachable_store());
        }
        let rejected = self.faults.reject_hash.lock().unwrap().clone();
        if rejected.as_deref() == Some(input.hash_value.as_str()) {
            return Err(query_error("value too long for column"));
        }
        self.inner.insert_hash(input).await
    }

    async fn find_hashes(&self, hash_value: &str) -> Result<Vec<HashRecord>, DbError> {
        if StoreFaults::take(&self.faults.find_outages) {
            return Err(unreachable_store());
        }
        if StoreFaults::take(&self.faults.find_errors) {
            return Err(query_error("statement cancelled"));
        }
        self.inner.find_hashes(hash_value).await
    }

    async fn count_hashes(&self) -> Result<i64, DbError> {
        self.inner.count_hashes().await
    }

    async fn count_distinct_sources(&self) -> Result<i64, DbError> {
        self.inner.count_distinct_sources().await
    }

    async fn insert_match(&self, input: &CreateHashMatch) -> Result<HashMatch, DbError> {
        self.inner.insert_match(input).await
    }

    async fn count_matches_since(&self, since: DateTime<Utc>) -> Result<i64, DbError> {
        self.inner.count_matches_since(since).await
    }

    async fn enqueue(&self, input: &CreateQueueItem) -> Result<NotificationQueueItem, DbError> {
        self.inner.enqueue(input).await
    }

    async fn find_queue_item(&self, id: Uuid) -> Result<Option<NotificationQueueItem>, DbError> {
        self.inner.find_queue_item(id).await
    }

    async fn fetch_pending(&self, limit: i64) -> Result<Vec<NotificationQueueItem>, DbError> {
        self.inner.fetch_pending(limit).await
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &QueueTransition,
    ) -> Result<bool, DbError> {
        self.inner.apply_transition(id, transition).await
    }

    async fn queue_status_counts(&self) -> Result<QueueStatusCounts, DbError> {
        self.inner.queue_status_counts().await
    }

    async fn upsert_subscription(
        &self,
        input: &UpsertWebhookSubscription,
    ) -> Result<WebhookSubscription, DbError> {
        self.inner.upsert_subscription(input).await
    }

    async fn find_active_subscription(
        &self,
        system_id: SourceSystem,
    ) -> Result<Option<WebhookSubscription>, DbError> {
        self.inner.find_active_subscription(system_id).await
    }

    async fn deactivate_subscription(&self, system_id: SourceSystem) -> Result<bool, DbError> {
        self.inner.deactivate_subscription(system_id).await
    }

    async fn insert_audit(&self, input: &CreateAuditLogEntry) -> Result<AuditLogEntry, DbError> {
        self.inner.insert_audit(input).await
    }

    async fn list_audit(
        &self,
        filter: &AuditLogFilter,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, DbError> {
        self.inner.list_audit(filter, limit).await
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.inner.ping().await
    }
}

/// In-memory backends wired to a hash service.
pub struct Harness {
    pub store: MemoryStore,
    pub faults: Arc<StoreFaults>,
    pub cache: Arc<dyn Cache>,
    pub dispatcher: Dispatcher,
    pub service: HashService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MemoryCache::new()))
    }

    pub fn with_cache(cache: Arc<dyn Cache>) -> Self {
        let store = MemoryStore::new();
        let faults = Arc::new(StoreFaults::default());
        let store_dyn: Arc<dyn Store> = Arc::new(FaultyStore {
            inner: store.clone(),
            faults: faults.clone(),
        });
        let dispatcher = Dispatcher::new(store_dyn.clone(), cache.clone(), SECRET).unwrap();
        let service = HashService::new(store_dyn, cache.clone(), dispatcher.clone());
        Self {
            store,
            faults,
            cache,
            dispatcher,
            service,
        }
    }

    pub fn router(&self) -> Router {
        self.router_with_limiter(RateLimiter::new(self.cache.clone()))
    }

    pub fn router_with_limiter(&self, limiter: RateLimiter) -> Router {
        hashes_router(HashesState::new(self.service.clone(), limiter))
    }

    pub async fn subscribe(&self, system: SourceSystem, url: &str) {
        self.store
            .upsert_subscription(&UpsertWebhookSubscription {
                system_id: system,
                webhook_url: url.to_string(),
                notification_types: NotificationType::ALL.to_vec(),
                filters: json!({}),
            })
            .await
            .unwrap();
    }
}

pub fn register_request(hash: &str, hash_type: &str, severity: Option<&str>) -> HashRegisterRequest {
    HashRegisterRequest {
        hash_value: hash.to_string(),
        hash_type: hash_type.to_string(),
        source_id: format!("case-{hash}"),
        severity: severity.map(str::to_string),
        tags: Some(vec!["csam".to_string()]),
        metadata: Some(json!({"reviewer": "analyst-7"})),
    }
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, value)
}
