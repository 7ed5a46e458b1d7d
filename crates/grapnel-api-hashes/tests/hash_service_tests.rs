//! Registration, lookup and match detection through the hash service.

mod common;

use common::*;
use grapnel_api_hashes::models::HashLookupRequest;
use grapnel_api_hashes::HashApiError;
use grapnel_core::{NotificationStatus, Severity, SourceSystem};
use grapnel_db::Store;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn lookup(hashes: &[&str], include_metadata: bool) -> HashLookupRequest {
    HashLookupRequest {
        hashes: hashes.iter().map(|h| h.to_string()).collect(),
        source_system: "grapnel".to_string(),
        include_metadata,
    }
}

#[tokio::test]
async fn test_registered_hash_is_found_by_another_partner() {
    let h = Harness::new();
    let response = h
        .service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("a1b2c3d4e5f6a1b2", "PHASH", Some("high"))],
        )
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.registered_count, 1);
    assert_eq!(response.hash_ids.len(), 1);

    let result = h
        .service
        .lookup_many(lookup(&["a1b2c3d4e5f6a1b2"], false))
        .await
        .unwrap();
    assert_eq!(result.total_matches, 1);
    let matched = &result.matches[0];
    assert!(matched.found);
    assert_eq!(matched.sources.len(), 1);
    assert_eq!(matched.sources[0].system, SourceSystem::Trace);
    assert_eq!(matched.sources[0].severity, Severity::High);
    assert_eq!(matched.sources[0].hash_id, response.hash_ids[0]);
    assert_eq!(matched.highest_severity, Some(Severity::High));
}

#[tokio::test]
async fn test_lookup_normalizes_input() {
    let h = Harness::new();
    h.service
        .register_batch(
            SourceSystem::Grapnel,
            vec![register_request("ABCDEF123456", "MD5", None)],
        )
        .await
        .unwrap();

    let padded = h.service.lookup(" ABCDEF123456 ").await.unwrap();
    let plain = h.service.lookup("abcdef123456").await.unwrap();
    assert_eq!(padded, plain);
    assert!(plain.found);
    assert_eq!(plain.hash, "abcdef123456");
    assert_eq!(plain.sources[0].severity, Severity::Medium);
}

#[tokio::test]
async fn test_unknown_hash_is_not_found() {
    let h = Harness::new();
    let result = h
        .service
        .lookup_many(lookup(&["ffffffffffffffff", "0000000000000000"], false))
        .await
        .unwrap();
    assert_eq!(result.matches.len(), 2);
    assert_eq!(result.total_matches, 0);
    assert!(result.matches.iter().all(|m| !m.found && m.sources.is_empty()));
}

#[tokio::test]
async fn test_lookup_is_cached_and_registration_invalidates() {
    let h = Harness::new();
    h.service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("cafebabecafebabe", "SHA256", None)],
        )
        .await
        .unwrap();

    let first = h.service.lookup_many(lookup(&["cafebabecafebabe"], false)).await.unwrap();
    assert!(!first.cached);
    let second = h.service.lookup_many(lookup(&["cafebabecafebabe"], false)).await.unwrap();
    assert!(second.cached);

    h.service
        .register_batch(
            SourceSystem::Takedown,
            vec![register_request("cafebabecafebabe", "SHA256", Some("low"))],
        )
        .await
        .unwrap();

    let third = h.service.lookup_many(lookup(&["cafebabecafebabe"], false)).await.unwrap();
    assert!(!third.cached);
    assert_eq!(third.matches[0].sources.len(), 2);
}

#[tokio::test]
async fn test_metadata_is_returned_only_on_request() {
    let h = Harness::new();
    h.service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("0123456789abcdef", "SHA256", None)],
        )
        .await
        .unwrap();

    let without = h.service.lookup_many(lookup(&["0123456789abcdef"], false)).await.unwrap();
    assert!(without.matches[0].sources[0].metadata.is_none());

    // Served from the cache, which keeps the full result.
    let with = h.service.lookup_many(lookup(&["0123456789abcdef"], true)).await.unwrap();
    assert!(with.cached);
    assert_eq!(
        with.matches[0].sources[0].metadata,
        Some(serde_json::json!({"reviewer": "analyst-7"}))
    );

    let again = h.service.lookup_many(lookup(&["0123456789abcdef"], false)).await.unwrap();
    assert!(again.matches[0].sources[0].metadata.is_none());
}

#[tokio::test]
async fn test_invalid_batches_are_rejected_whole() {
    let h = Harness::new();

    let empty = h.service.register_batch(SourceSystem::Trace, Vec::new()).await;
    assert!(matches!(empty, Err(HashApiError::Validation(_))));

    let oversize = (0..101)
        .map(|i| register_request(&format!("{i:016x}"), "MD5", None))
        .collect();
    let oversize = h.service.register_batch(SourceSystem::Trace, oversize).await;
    assert!(matches!(oversize, Err(HashApiError::Validation(_))));

    let mixed = vec![
        register_request("abcdefabcdef", "MD5", None),
        register_request("short", "MD5", None),
    ];
    let mixed = h.service.register_batch(SourceSystem::Trace, mixed).await;
    assert!(matches!(mixed, Err(HashApiError::Validation(_))));
    assert_eq!(h.store.count_hashes().await.unwrap(), 0);

    let too_many_lookups: Vec<String> = (0..101).map(|i| format!("{i:016x}")).collect();
    let refs: Vec<&str> = too_many_lookups.iter().map(String::as_str).collect();
    assert!(matches!(
        h.service.lookup_many(lookup(&refs, false)).await,
        Err(HashApiError::Validation(_))
    ));
}

#[tokio::test]
async fn test_cross_partner_registration_queues_notifications() {
    let h = Harness::new();
    h.service
        .register_batch(
            SourceSystem::Grapnel,
            vec![register_request("deadbeefdeadbeef", "SHA256", None)],
        )
        .await
        .unwrap();

    let response = h
        .service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("deadbeefdeadbeef", "SHA256", Some("critical"))],
        )
        .await
        .unwrap();

    let outcome = &response.results[0];
    let match_id = outcome.match_id.expect("match detected");
    assert_eq!(
        outcome.systems_notified,
        vec![SourceSystem::Grapnel, SourceSystem::Takedown]
    );

    let matches = h.store.matches().await;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, match_id);
    assert_eq!(matches[0].matched_system, SourceSystem::Grapnel);
    assert_eq!(matches[0].primary_hash_id, Some(response.hash_ids[0]));

    let items = h.store.queue_items().await;
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.match_id == match_id));
    assert_eq!(items[0].payload["severity"], "critical");
    assert_eq!(items[0].payload["new_source_system"], "trace");
}

#[tokio::test]
async fn test_same_partner_reregistration_is_not_a_match() {
    let h = Harness::new();
    for _ in 0..2 {
        h.service
            .register_batch(
                SourceSystem::Takedown,
                vec![register_request("1111222233334444", "MD5", Some("critical"))],
            )
            .await
            .unwrap();
    }

    assert_eq!(h.store.count_hashes().await.unwrap(), 2);
    assert!(h.store.matches().await.is_empty());
    assert!(h.store.queue_items().await.is_empty());
}

#[tokio::test]
async fn test_low_severity_match_notifies_only_existing_holder() {
    let h = Harness::new();
    h.service
        .register_batch(
            SourceSystem::Grapnel,
            vec![register_request("5555666677778888", "MD5", None)],
        )
        .await
        .unwrap();
    let response = h
        .service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("5555666677778888", "MD5", Some("low"))],
        )
        .await
        .unwrap();

    assert_eq!(response.results[0].systems_notified, vec![SourceSystem::Grapnel]);
    let items = h.store.queue_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].target_system, SourceSystem::Grapnel);
}

#[tokio::test]
async fn test_match_is_delivered_to_partner_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/grapnel"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1..)
        .mount(&server)
        .await;

    let h = Harness::new();
    h.subscribe(SourceSystem::Grapnel, &format!("{}/grapnel", server.uri()))
        .await;
    h.service
        .register_batch(
            SourceSystem::Grapnel,
            vec![register_request("9999aaaabbbbcccc", "SHA256", None)],
        )
        .await
        .unwrap();
    h.service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("9999aaaabbbbcccc", "SHA256", Some("medium"))],
        )
        .await
        .unwrap();

    h.dispatcher.process_queue().await.unwrap();

    let items = h.store.queue_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, NotificationStatus::Sent);

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["data"]["hash_value"], "9999aaaabbbbcccc");
    assert_eq!(body["notification_id"], serde_json::json!(items[0].id));
}

#[tokio::test]
async fn test_stats_are_cached() {
    let h = Harness::new();
    h.service
        .register_batch(
            SourceSystem::Trace,
            vec![
                register_request("aaaaaaaaaaaaaaaa", "MD5", None),
                register_request("bbbbbbbbbbbbbbbb", "MD5", None),
            ],
        )
        .await
        .unwrap();
    h.service
        .register_batch(
            SourceSystem::Grapnel,
            vec![register_request("aaaaaaaaaaaaaaaa", "MD5", None)],
        )
        .await
        .unwrap();

    let stats = h.service.stats().await.unwrap();
    assert_eq!(stats.total_hashes, 3);
    assert_eq!(stats.systems_connected, 2);
    assert_eq!(stats.recent_matches, 1);

    h.service
        .register_batch(
            SourceSystem::Takedown,
            vec![register_request("cccccccccccccccc", "MD5", None)],
        )
        .await
        .unwrap();
    assert_eq!(h.service.stats().await.unwrap(), stats);
}

#[tokio::test]
async fn test_registration_and_lookup_survive_cache_outage() {
    let h = Harness::with_cache(std::sync::Arc::new(FailingCache));
    h.service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("feedfacefeedface", "SHA256", None)],
        )
        .await
        .unwrap();

    let result = h.service.lookup_many(lookup(&["feedfacefeedface"], false)).await.unwrap();
    assert!(result.matches[0].found);
    assert!(!result.cached);
    assert_eq!(h.service.stats().await.unwrap().total_hashes, 1);
}

#[tokio::test]
async fn test_batch_registration_writes_one_audit_entry() {
    let h = Harness::new();
    h.service
        .register_batch(
            SourceSystem::Trace,
            vec![
                register_request("1234567812345678", "MD5", None),
                register_request("8765432187654321", "MD5", None),
            ],
        )
        .await
        .unwrap();

    let entries = h
        .store
        .list_audit(&grapnel_db::AuditLogFilter::default(), 10)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "hash_register_batch");
    assert_eq!(entries[0].system_id.as_deref(), Some("trace"));
    assert_eq!(entries[0].details["registered_count"], 2);
}

#[tokio::test]
async fn test_one_failed_insert_does_not_block_the_batch() {
    let h = Harness::new();
    h.faults.reject("2222222222222222");

    let response = h
        .service
        .register_batch(
            SourceSystem::Trace,
            vec![
                register_request("1111111111111111", "MD5", None),
                register_request("2222222222222222", "MD5", None),
                register_request("3333333333333333", "MD5", None),
            ],
        )
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.registered_count, 2);
    assert_eq!(response.failed_count, 1);
    assert_eq!(response.hash_ids.len(), 2);
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].contains("2222222222222222"));

    let failed = &response.results[1];
    assert_eq!(failed.hash_value, "2222222222222222");
    assert!(failed.hash_id.is_none());
    assert!(failed.error.is_some());
    assert!(response.results[0].hash_id.is_some());
    assert!(response.results[2].hash_id.is_some());

    let result = h
        .service
        .lookup_many(lookup(
            &["1111111111111111", "2222222222222222", "3333333333333333"],
            false,
        ))
        .await
        .unwrap();
    let found: Vec<bool> = result.matches.iter().map(|m| m.found).collect();
    assert_eq!(found, vec![true, false, true]);

    let entries = h
        .store
        .list_audit(&grapnel_db::AuditLogFilter::default(), 10)
        .await
        .unwrap();
    assert_eq!(entries[0].details["failed_count"], 1);
}

#[tokio::test]
async fn test_unreachable_store_on_insert_fails_the_batch() {
    let h = Harness::new();
    h.faults
        .insert_outages
        .store(1, std::sync::atomic::Ordering::SeqCst);

    let result = h
        .service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("abcdef0123456789", "MD5", None)],
        )
        .await;

    match result {
        Err(HashApiError::Database(e)) => assert!(e.is_unavailable()),
        other => panic!("expected unavailable store, got {other:?}"),
    }
    assert_eq!(h.store.count_hashes().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unreachable_store_before_insert_keeps_match_retryable() {
    let h = Harness::new();
    h.service
        .register_batch(
            SourceSystem::Grapnel,
            vec![register_request("abcdef0123456789", "SHA256", None)],
        )
        .await
        .unwrap();

    h.faults
        .find_outages
        .store(1, std::sync::atomic::Ordering::SeqCst);
    let result = h
        .service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("abcdef0123456789", "SHA256", Some("critical"))],
        )
        .await;
    assert!(matches!(result, Err(HashApiError::Database(ref e)) if e.is_unavailable()));
    assert_eq!(h.store.count_hashes().await.unwrap(), 1);
    assert!(h.store.matches().await.is_empty());
    assert!(h.store.queue_items().await.is_empty());

    let retried = h
        .service
        .register_batch(
            SourceSystem::Trace,
            vec![register_request("abcdef0123456789", "SHA256", Some("critical"))],
        )
        .await
        .unwrap();
    assert!(retried.success);
    assert!(retried.results[0].match_id.is_some());
    assert_eq!(h.store.matches().await.len(), 1);
    assert!(!h.store.queue_items().await.is_empty());
}

#[tokio::test]
async fn test_failed_existing_read_fails_the_record_without_inserting() {
    let h = Harness::new();
    h.service
        .register_batch(
            SourceSystem::Grapnel,
            vec![register_request("abcdef0123456789", "SHA256", None)],
        )
        .await
        .unwrap();

    h.faults
        .find_errors
        .store(1, std::sync::atomic::Ordering::SeqCst);
    let response = h
        .service
        .register_batch(
            SourceSystem::Trace,
            vec![
                register_request("abcdef0123456789", "SHA256", None),
                register_request("0123456789abcdef", "SHA256", None),
            ],
        )
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.registered_count, 1);
    assert_eq!(response.failed_count, 1);
    assert!(response.results[0].hash_id.is_none());
    assert!(response.results[0].error.is_some());
    assert!(response.results[1].hash_id.is_some());
    assert_eq!(h.store.find_hashes("abcdef0123456789").await.unwrap().len(), 1);
    assert!(h.store.matches().await.is_empty());
}
