//! Fan-out query behavior across multiple relays.

use crate::harness::{MockRelay, signed_note};
use nostr_client::{ConnectionPool, Filter, PoolConfig, query};
use nostr_core::generate_secret_key;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn short_pool() -> Arc<ConnectionPool> {
    Arc::new(ConnectionPool::new(PoolConfig {
        connect_timeout: Duration::from_secs(2),
    }))
}

#[tokio::test]
async fn merges_and_dedups_across_relays() {
    let key = generate_secret_key();
    let e1 = signed_note(&key, "one", 1_700_000_001);
    let e2 = signed_note(&key, "two", 1_700_000_002);
    let e3 = signed_note(&key, "three", 1_700_000_003);
    let e4 = signed_note(&key, "four", 1_700_000_004);

    // Relay a yields {1,2,3}; relay b yields {2,4}; id 2 must count once.
    let relay_a = MockRelay::start(vec![e1.clone(), e2.clone(), e3.clone()]).await;
    let relay_b = MockRelay::start(vec![e2.clone(), e4.clone()]).await;

    let pool = short_pool();
    let urls = vec![relay_a.url(), relay_b.url()];
    let outcome = query(
        &pool,
        &urls,
        Filter::new().kinds(vec![1]).limit(10),
        Duration::from_secs(3),
        Duration::from_secs(6),
    )
    .await
    .unwrap();

    assert_eq!(outcome.events.len(), 4);
    assert_eq!(outcome.rejected, 0);
    assert_eq!(outcome.relays_failed, 0);

    let ids: HashSet<&str> = outcome.events.iter().map(|e| e.id.as_str()).collect();
    let expected: HashSet<&str> = [&e1, &e2, &e3, &e4].iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, expected);

    let duplicates = outcome.events.iter().filter(|e| e.id == e2.id).count();
    assert_eq!(duplicates, 1);
}

#[tokio::test]
async fn one_relay_down_does_not_fail_the_query() {
    let key = generate_secret_key();
    let e1 = signed_note(&key, "survivor", 1_700_000_001);

    let relay_up = MockRelay::start(vec![e1.clone()]).await;
    let urls = vec!["ws://127.0.0.1:1".to_string(), relay_up.url()];

    let pool = short_pool();
    let outcome = query(
        &pool,
        &urls,
        Filter::new().kinds(vec![1]),
        Duration::from_secs(3),
        Duration::from_secs(6),
    )
    .await
    .unwrap();

    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].id, e1.id);
    assert_eq!(outcome.relays_queried, 2);
    assert_eq!(outcome.relays_failed, 1);
}

#[tokio::test]
async fn unverifiable_events_are_dropped_and_counted() {
    let key = generate_secret_key();
    let good = signed_note(&key, "good", 1_700_000_001);

    let mut zero_sig = signed_note(&key, "zero sig", 1_700_000_002);
    zero_sig.sig = "0".repeat(128);

    let mut tampered = signed_note(&key, "original", 1_700_000_003);
    tampered.content = "forged".to_string();

    let relay = MockRelay::start(vec![good.clone(), zero_sig, tampered]).await;

    let pool = short_pool();
    let urls = vec![relay.url()];
    let outcome = query(
        &pool,
        &urls,
        Filter::new().kinds(vec![1]),
        Duration::from_secs(3),
        Duration::from_secs(6),
    )
    .await
    .unwrap();

    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].id, good.id);
    assert_eq!(outcome.rejected, 2);
}

#[tokio::test]
async fn reuses_pooled_connections_across_queries() {
    let key = generate_secret_key();
    let relay = MockRelay::start(vec![signed_note(&key, "cached", 1_700_000_001)]).await;

    let pool = short_pool();
    let urls = vec![relay.url()];
    for _ in 0..3 {
        let outcome = query(
            &pool,
            &urls,
            Filter::new().kinds(vec![1]),
            Duration::from_secs(3),
            Duration::from_secs(6),
        )
        .await
        .unwrap();
        assert_eq!(outcome.events.len(), 1);
    }

    // One live connection served all three queries.
    assert_eq!(relay.connection_count(), 1);
    let stats = pool.stats().await;
    assert_eq!(stats.active_connections, 1);
    assert_eq!(stats.relays[0].failed_attempts, 0);
}
