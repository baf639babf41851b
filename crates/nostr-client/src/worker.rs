//! Long-lived subscription worker.
//!
//! One worker holds one persistent subscription against one relay and feeds
//! every verified event to a callback, forever. The loop is an explicit
//! state machine:
//!
//! ```text
//! Connecting -> Subscribed -> Receiving
//!      ^                         |
//!      |        (backoff)        v
//!      +------ Reconnecting <----+
//!
//! any state --(shutdown)--> Stopped
//! ```
//!
//! Relay outages move the worker to Reconnecting; after a fixed backoff it
//! returns to Connecting with a fresh subscription id. Callback failures
//! are logged with the event id and never terminate the loop — one bad
//! event must not kill the stream. Only the shutdown token reaches Stopped.

use crate::error::Result;
use crate::generate_subscription_id;
use crate::message::{ClientMessage, Filter, RelayMessage};
use crate::pool::ConnectionPool;
use nostr_core::{Event, verify_event};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback invoked for every verified event the subscription delivers.
pub type EventHandler =
    Arc<dyn Fn(&Event) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Establishing the connection and not yet subscribed
    Connecting,
    /// REQ sent, waiting for the first frame
    Subscribed,
    /// Streaming events
    Receiving,
    /// Connection lost, waiting out the backoff
    Reconnecting,
    /// Shutdown observed; terminal
    Stopped,
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Fixed delay between reconnection attempts
    pub reconnect_delay: Duration,
    /// Upper bound on one `recv` call; also bounds shutdown latency
    pub receive_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            receive_timeout: Duration::from_secs(30),
        }
    }
}

/// A persistent subscription to one relay.
pub struct SubscriptionWorker {
    pool: Arc<ConnectionPool>,
    relay_url: String,
    filter: Filter,
    config: WorkerConfig,
    state: RwLock<WorkerState>,
    reconnects: AtomicU64,
    rejected: AtomicU64,
}

impl SubscriptionWorker {
    /// Create a worker with the default configuration.
    pub fn new(pool: Arc<ConnectionPool>, relay_url: impl Into<String>, filter: Filter) -> Self {
        Self::with_config(pool, relay_url, filter, WorkerConfig::default())
    }

    /// Create a worker with a custom configuration.
    pub fn with_config(
        pool: Arc<ConnectionPool>,
        relay_url: impl Into<String>,
        filter: Filter,
        config: WorkerConfig,
    ) -> Self {
        Self {
            pool,
            relay_url: relay_url.into(),
            filter,
            config,
            state: RwLock::new(WorkerState::Connecting),
            reconnects: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Current state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Number of reconnection cycles so far.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Number of events dropped for failing verification.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// The relay this worker is bound to.
    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Blocks the calling task for its whole life; run one worker per task.
    /// Returns cleanly (state Stopped, connection closed) within one
    /// receive-timeout interval of cancellation.
    pub async fn run(&self, on_event: EventHandler, shutdown: CancellationToken) -> Result<()> {
        info!("subscription worker starting for {}", self.relay_url);

        loop {
            if shutdown.is_cancelled() {
                return self.stop(None).await;
            }
            self.set_state(WorkerState::Connecting).await;

            let connection = tokio::select! {
                _ = shutdown.cancelled() => return self.stop(None).await,
                result = self.pool.get_connection(&self.relay_url) => match result {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!("worker cannot reach {}: {}", self.relay_url, e);
                        if !self.backoff(&shutdown).await {
                            return self.stop(None).await;
                        }
                        continue;
                    }
                }
            };

            let subscription_id = generate_subscription_id();
            if let Err(e) = connection
                .send(&ClientMessage::req(
                    subscription_id.as_str(),
                    self.filter.clone(),
                ))
                .await
            {
                warn!("worker failed to subscribe on {}: {}", self.relay_url, e);
                if !self.backoff(&shutdown).await {
                    return self.stop(None).await;
                }
                continue;
            }
            self.set_state(WorkerState::Subscribed).await;
            debug!(
                "worker subscribed on {} as {}",
                self.relay_url, subscription_id
            );

            self.set_state(WorkerState::Receiving).await;
            loop {
                let frame = tokio::select! {
                    _ = shutdown.cancelled() => {
                        return self.stop(Some(connection.as_ref())).await;
                    }
                    frame = connection.recv(self.config.receive_timeout) => frame,
                };

                match frame {
                    Ok(Some(RelayMessage::Event {
                        subscription_id: sub,
                        event,
                    })) if sub == subscription_id => {
                        self.handle_event(&on_event, &event);
                    }
                    Ok(Some(RelayMessage::Eose { .. })) => {
                        // Backlog drained; the live stream continues.
                    }
                    Ok(Some(RelayMessage::Closed {
                        subscription_id: sub,
                        message,
                    })) if sub == subscription_id => {
                        warn!(
                            "{} closed subscription {}: {}",
                            self.relay_url, sub, message
                        );
                        break;
                    }
                    Ok(Some(RelayMessage::Notice { message })) => {
                        debug!("notice from {}: {}", self.relay_url, message);
                    }
                    Ok(Some(RelayMessage::Auth { .. })) => {
                        debug!("auth challenge from {} left unanswered", self.relay_url);
                    }
                    Ok(Some(_)) | Ok(None) => {}
                    Err(e) => {
                        warn!("worker lost {}: {}", self.relay_url, e);
                        break;
                    }
                }
            }

            self.set_state(WorkerState::Reconnecting).await;
            self.reconnects.fetch_add(1, Ordering::Relaxed);
            if !self.backoff(&shutdown).await {
                return self.stop(None).await;
            }
        }
    }

    fn handle_event(&self, on_event: &EventHandler, event: &Event) {
        match verify_event(event) {
            Ok(true) => {
                if let Err(e) = on_event(event) {
                    warn!(
                        "event handler failed for {} from {}: {}",
                        event.id, self.relay_url, e
                    );
                }
            }
            _ => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "dropping unverified event {} from {}",
                    event.id, self.relay_url
                );
            }
        }
    }

    /// Wait out the fixed backoff; false means shutdown arrived first.
    async fn backoff(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = sleep(self.config.reconnect_delay) => true,
        }
    }

    async fn stop(
        &self,
        connection: Option<&crate::connection::RelayConnection>,
    ) -> Result<()> {
        if let Some(connection) = connection {
            let _ = connection.close().await;
        }
        self.set_state(WorkerState::Stopped).await;
        info!("subscription worker for {} stopped", self.relay_url);
        Ok(())
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn worker_starts_in_connecting_state() {
        let pool = Arc::new(ConnectionPool::default());
        let worker = SubscriptionWorker::new(pool, "wss://relay.example.com", Filter::new());
        assert_eq!(worker.state().await, WorkerState::Connecting);
        assert_eq!(worker.reconnect_count(), 0);
        assert_eq!(worker.rejected_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_before_connect_stops_cleanly() {
        let pool = Arc::new(ConnectionPool::default());
        let worker = Arc::new(SubscriptionWorker::new(
            pool,
            "ws://127.0.0.1:1",
            Filter::new(),
        ));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let handler: EventHandler = Arc::new(|_| Ok(()));
        worker.run(handler, shutdown).await.unwrap();
        assert_eq!(worker.state().await, WorkerState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_during_backoff_stops_cleanly() {
        let pool = Arc::new(ConnectionPool::new(crate::PoolConfig {
            connect_timeout: Duration::from_millis(200),
        }));
        let worker = Arc::new(SubscriptionWorker::with_config(
            pool,
            "ws://127.0.0.1:1",
            Filter::new(),
            WorkerConfig {
                reconnect_delay: Duration::from_secs(60),
                receive_timeout: Duration::from_millis(200),
            },
        ));
        let shutdown = CancellationToken::new();

        let run_worker = Arc::clone(&worker);
        let run_shutdown = shutdown.clone();
        let handler: EventHandler = Arc::new(|_| Ok(()));
        let handle =
            tokio::spawn(async move { run_worker.run(handler, run_shutdown).await });

        // Give the worker time to fail its connect and enter backoff.
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop promptly")
            .unwrap()
            .unwrap();
        assert_eq!(worker.state().await, WorkerState::Stopped);
    }
}
