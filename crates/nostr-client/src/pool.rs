//! Relay connection pool.
//!
//! A pure resource cache keyed by relay URL: at most one live connection per
//! relay, lazily created, reused across the aggregator and the subscription
//! workers. The pool never retries, never spawns background tasks, and never
//! schedules anything — a connect failure bumps the relay's failure counter
//! and propagates to the caller, and staleness cleanup runs only when an
//! external periodic task asks for it.
//!
//! The map behind [`ConnectionPool`] is the one piece of shared mutable
//! state in the pipeline; only pool methods touch it.

use crate::connection::{ConnectionConfig, RelayConnection};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Handshake timeout applied to every connection the pool creates
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Cached per-relay state.
struct PooledRelay {
    connection: Arc<RelayConnection>,
    /// Cumulative connect failures for this relay
    failed_attempts: u64,
    /// Instant of the last successful connect
    last_connected: Option<Instant>,
}

/// Connection pool keyed by relay URL.
pub struct ConnectionPool {
    relays: RwLock<HashMap<String, PooledRelay>>,
    config: PoolConfig,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl ConnectionPool {
    /// Create a new pool.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            relays: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the live connection for a relay, creating one if needed.
    ///
    /// Returns the cached connection when it is still alive; otherwise
    /// creates and connects a fresh one. A connect failure increments the
    /// relay's failure counter and propagates — retry scheduling belongs to
    /// the caller.
    pub async fn get_connection(&self, url: &str) -> Result<Arc<RelayConnection>> {
        {
            let relays = self.relays.read().await;
            if let Some(entry) = relays.get(url) {
                if entry.connection.is_connected().await {
                    return Ok(Arc::clone(&entry.connection));
                }
            }
        }

        // Connect outside the map lock so a slow handshake to one relay
        // never stalls the legs talking to the others.
        let config = ConnectionConfig {
            url: url.to_string(),
            connect_timeout: self.config.connect_timeout,
        };
        let candidate = Arc::new(RelayConnection::new(config)?);

        match candidate.connect().await {
            Ok(()) => {
                let mut relays = self.relays.write().await;
                if let Some(entry) = relays.get(url) {
                    // Another caller won the race while we were connecting;
                    // keep the map's connection so one relay never holds two
                    // live sockets.
                    if entry.connection.is_connected().await
                        && !Arc::ptr_eq(&entry.connection, &candidate)
                    {
                        let _ = candidate.close().await;
                        return Ok(Arc::clone(&entry.connection));
                    }
                }
                let entry = relays.entry(url.to_string()).or_insert_with(|| PooledRelay {
                    connection: Arc::clone(&candidate),
                    failed_attempts: 0,
                    last_connected: None,
                });
                entry.connection = Arc::clone(&candidate);
                entry.last_connected = Some(Instant::now());
                debug!("pooled connection to {}", url);
                Ok(candidate)
            }
            Err(e) => {
                let mut relays = self.relays.write().await;
                let entry = relays.entry(url.to_string()).or_insert_with(|| PooledRelay {
                    connection: Arc::clone(&candidate),
                    failed_attempts: 0,
                    last_connected: None,
                });
                entry.failed_attempts += 1;
                warn!(
                    "connect to {} failed ({} attempts): {}",
                    url, entry.failed_attempts, e
                );
                Err(e)
            }
        }
    }

    /// Close and remove connections whose last traffic exceeds `max_age`.
    ///
    /// Returns the number of relays removed. Invoked by an external
    /// periodic task; the pool keeps no timer of its own.
    pub async fn cleanup_stale(&self, max_age: Duration) -> usize {
        let mut relays = self.relays.write().await;

        let mut stale = Vec::new();
        for (url, entry) in relays.iter() {
            let age = entry.connection.last_activity().await.elapsed();
            if age > max_age {
                stale.push(url.clone());
            }
        }

        for url in &stale {
            if let Some(entry) = relays.remove(url) {
                if let Err(e) = entry.connection.close().await {
                    warn!("error closing stale connection to {}: {}", url, e);
                }
                debug!("removed stale connection to {}", url);
            }
        }

        stale.len()
    }

    /// Snapshot of pool health for observability.
    pub async fn stats(&self) -> PoolStats {
        let relays = self.relays.read().await;

        let mut out = Vec::with_capacity(relays.len());
        let mut active = 0;
        for (url, entry) in relays.iter() {
            let connected = entry.connection.is_connected().await;
            if connected {
                active += 1;
            }
            out.push(RelayStats {
                url: url.clone(),
                connected,
                failed_attempts: entry.failed_attempts,
                last_connected: entry.last_connected.map(|t| t.elapsed()),
                age: entry.connection.last_activity().await.elapsed(),
            });
        }
        out.sort_by(|a, b| a.url.cmp(&b.url));

        PoolStats {
            active_connections: active,
            relays: out,
        }
    }

    /// Close every connection and clear the pool.
    pub async fn close_all(&self) {
        let mut relays = self.relays.write().await;
        for (url, entry) in relays.drain() {
            if let Err(e) = entry.connection.close().await {
                warn!("error closing connection to {}: {}", url, e);
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn insert_idle_for_test(&self, url: &str) {
        let connection =
            Arc::new(RelayConnection::new(ConnectionConfig::new(url)).unwrap());
        let mut relays = self.relays.write().await;
        relays.insert(
            url.to_string(),
            PooledRelay {
                connection,
                failed_attempts: 0,
                last_connected: None,
            },
        );
    }
}

/// Pool-wide statistics.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Number of currently live connections
    pub active_connections: usize,
    /// Per-relay detail, sorted by URL
    pub relays: Vec<RelayStats>,
}

/// Per-relay statistics.
#[derive(Debug, Clone)]
pub struct RelayStats {
    pub url: String,
    pub connected: bool,
    /// Cumulative connect failures
    pub failed_attempts: u64,
    /// Time since the last successful connect, if any
    pub last_connected: Option<Duration>,
    /// Time since the last frame in either direction
    pub age: Duration,
}
