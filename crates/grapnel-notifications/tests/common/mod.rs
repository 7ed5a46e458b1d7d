//! Common test utilities for grapnel-notifications integration tests.
//!
//! Provides wiremock responders, a cache that always fails, and helpers that
//! wire a dispatcher to in-memory backends.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use grapnel_cache::{Cache, CacheError, MemoryCache};
use grapnel_core::{NotificationType, SourceSystem};
use grapnel_db::{MemoryStore, NotificationQueueItem, Store, UpsertWebhookSubscription};
use grapnel_notifications::services::dispatcher::DispatchConfig;
use grapnel_notifications::Dispatcher;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const SECRET: &str = "grapnel_test_shared_secret";

// ---------------------------------------------------------------------------
// CapturedRequest
// ---------------------------------------------------------------------------

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl CapturedRequest {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }

    /// Header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder
// ---------------------------------------------------------------------------

/// Captures every request. Fails the first `failures` with 500, then answers
/// with `response_code`.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    attempts: Arc<AtomicU32>,
    failures: u32,
    response_code: u16,
}

impl CaptureResponder {
    pub fn new() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicU32::new(0)),
            failures: 0,
            response_code: status,
        }
    }

    pub fn fail_first(n: u32) -> Self {
        Self {
            failures: n,
            ..Self::new()
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let captured = CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
        };
        self.requests.lock().unwrap().push(captured);

        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(self.response_code)
        }
    }
}

// ---------------------------------------------------------------------------
// DelayedResponder
// ---------------------------------------------------------------------------

/// Answers 200 after a delay.
#[derive(Clone)]
pub struct DelayedResponder {
    delay: Duration,
}

impl DelayedResponder {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
        }
    }
}

impl Respond for DelayedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_delay(self.delay)
    }
}

// ---------------------------------------------------------------------------
// FailingCache
// ---------------------------------------------------------------------------

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

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// In-memory backends shared by a test.
pub struct Harness {
    pub store: MemoryStore,
    pub cache: Arc<dyn Cache>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        Self::build(Arc::new(MemoryCache::new()), config)
    }

    pub fn build(cache: Arc<dyn Cache>, config: DispatchConfig) -> Self {
        let store = MemoryStore::new();
        let dispatcher =
            Dispatcher::with_config(Arc::new(store.clone()), cache.clone(), SECRET, config).unwrap();
        Self {
            store,
            cache,
            dispatcher,
        }
    }

    /// Another dispatcher over the same store and cache.
    pub fn second_dispatcher(&self) -> Dispatcher {
        Dispatcher::with_config(
            Arc::new(self.store.clone()),
            self.cache.clone(),
            SECRET,
            self.dispatcher.config().clone(),
        )
        .unwrap()
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

    pub async fn enqueue(&self, target: SourceSystem) -> NotificationQueueItem {
        self.dispatcher
            .enqueue(
                Uuid::new_v4(),
                target,
                NotificationType::HashMatch,
                json!({"hash_value": "a1b2c3d4e5f6a1b2", "severity": "high"}),
            )
            .await
            .unwrap()
    }

    pub async fn stored(&self, id: Uuid) -> NotificationQueueItem {
        self.store.find_queue_item(id).await.unwrap().unwrap()
    }
}

/// Mount `responder` on `POST /hook` and return the hook URL.
pub async fn mount_hook<R: Respond + 'static>(server: &MockServer, responder: R) -> String {
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(responder)
        .mount(server)
        .await;
    format!("{}/hook", server.uri())
}
