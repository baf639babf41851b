//! Subscription worker resilience against relay drops.

use crate::harness::{MockRelay, signed_note};
use nostr_client::{
    ConnectionPool, EventHandler, Filter, PoolConfig, SubscriptionWorker, WorkerConfig,
    WorkerState,
};
use nostr_core::generate_secret_key;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

fn test_worker(pool: Arc<ConnectionPool>, url: String) -> Arc<SubscriptionWorker> {
    Arc::new(SubscriptionWorker::with_config(
        pool,
        url,
        Filter::new().kinds(vec![1]),
        WorkerConfig {
            reconnect_delay: Duration::from_millis(200),
            receive_timeout: Duration::from_millis(300),
        },
    ))
}

fn collector() -> (EventHandler, Arc<Mutex<Vec<String>>>) {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: EventHandler = Arc::new(move |event| {
        sink.lock().unwrap().push(event.id.clone());
        Ok(())
    });
    (handler, seen)
}

async fn wait_for(deadline: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let stop = Instant::now() + deadline;
    while Instant::now() < stop {
        if predicate() {
            return true;
        }
        sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn reconnects_after_drop_and_keeps_delivering() {
    let key = generate_secret_key();
    let backlog = signed_note(&key, "backlog", 1_700_000_001);
    let relay = MockRelay::start(vec![backlog.clone()]).await;

    let pool = Arc::new(ConnectionPool::new(PoolConfig {
        connect_timeout: Duration::from_secs(2),
    }));
    let worker = test_worker(Arc::clone(&pool), relay.url());
    let (handler, seen) = collector();

    let shutdown = CancellationToken::new();
    let run_worker = Arc::clone(&worker);
    let run_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { run_worker.run(handler, run_shutdown).await });

    // The backlog arrives over the first connection.
    let backlog_id = backlog.id.clone();
    let seen_first = Arc::clone(&seen);
    assert!(
        wait_for(Duration::from_secs(5), move || {
            seen_first.lock().unwrap().contains(&backlog_id)
        })
        .await,
        "worker never delivered the backlog event"
    );
    assert_eq!(worker.reconnect_count(), 0);

    // Kill the connection mid-stream; the worker must reconnect on its own
    // and resubscribe, which replays the backlog over the new connection.
    relay.drop_connections();
    let backlog_id = backlog.id.clone();
    let seen_replay = Arc::clone(&seen);
    assert!(
        wait_for(Duration::from_secs(5), move || {
            seen_replay
                .lock()
                .unwrap()
                .iter()
                .filter(|id| **id == backlog_id)
                .count()
                >= 2
        })
        .await,
        "worker never resubscribed after the drop"
    );
    assert_eq!(worker.reconnect_count(), 1);
    assert!(relay.connection_count() >= 2);

    // Live events flow again after the reconnect.
    let live = signed_note(&key, "after reconnect", 1_700_000_002);
    relay.push(live.clone());
    let live_id = live.id.clone();
    let seen_live = Arc::clone(&seen);
    assert!(
        wait_for(Duration::from_secs(5), move || {
            seen_live.lock().unwrap().contains(&live_id)
        })
        .await,
        "worker never delivered events after reconnecting"
    );

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker should honor shutdown within one receive timeout")
        .unwrap()
        .unwrap();
    assert_eq!(worker.state().await, WorkerState::Stopped);
}

#[tokio::test]
async fn failing_handler_does_not_kill_the_stream() {
    let key = generate_secret_key();
    let first = signed_note(&key, "first", 1_700_000_001);
    let relay = MockRelay::start(vec![first.clone()]).await;

    let pool = Arc::new(ConnectionPool::default());
    let worker = test_worker(Arc::clone(&pool), relay.url());

    // Handler rejects everything; the worker must log and keep receiving.
    let calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let handler: EventHandler = Arc::new(move |event| {
        sink.lock().unwrap().push(event.id.clone());
        Err("downstream store unavailable".into())
    });

    let shutdown = CancellationToken::new();
    let run_worker = Arc::clone(&worker);
    let run_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { run_worker.run(handler, run_shutdown).await });

    let first_id = first.id.clone();
    let calls_first = Arc::clone(&calls);
    assert!(
        wait_for(Duration::from_secs(5), move || {
            calls_first.lock().unwrap().contains(&first_id)
        })
        .await
    );

    // A second event still arrives even though the handler keeps failing.
    let second = signed_note(&key, "second", 1_700_000_002);
    relay.push(second.clone());
    let second_id = second.id.clone();
    let calls_second = Arc::clone(&calls);
    assert!(
        wait_for(Duration::from_secs(5), move || {
            calls_second.lock().unwrap().contains(&second_id)
        })
        .await,
        "handler failure terminated the stream"
    );
    assert_eq!(worker.reconnect_count(), 0);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn unverifiable_events_are_counted_not_delivered() {
    let key = generate_secret_key();
    let mut forged = signed_note(&key, "original", 1_700_000_001);
    forged.content = "forged".to_string();
    let good = signed_note(&key, "good", 1_700_000_002);

    let relay = MockRelay::start(vec![forged, good.clone()]).await;

    let pool = Arc::new(ConnectionPool::default());
    let worker = test_worker(Arc::clone(&pool), relay.url());
    let (handler, seen) = collector();

    let shutdown = CancellationToken::new();
    let run_worker = Arc::clone(&worker);
    let run_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { run_worker.run(handler, run_shutdown).await });

    let good_id = good.id.clone();
    let seen_good = Arc::clone(&seen);
    assert!(
        wait_for(Duration::from_secs(5), move || {
            seen_good.lock().unwrap().contains(&good_id)
        })
        .await
    );

    assert_eq!(worker.rejected_count(), 1);
    assert_eq!(seen.lock().unwrap().len(), 1);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
