//! Relay WebSocket client for the hydration pipeline.
//!
//! This crate provides the network side of hydration, client role only:
//! - Single relay connections with caller-driven receive (NIP-01 protocol)
//! - A connection pool keyed by relay URL, one live connection per relay
//! - Fan-out queries across relay sets with per-relay and overall deadlines
//! - Long-lived subscription workers that reconnect across relay outages
//!
//! Relays are never trusted: every EVENT frame is verified against its id
//! and Schnorr signature before it reaches a caller, and events that fail
//! verification are dropped and counted, never propagated.
//!
//! # Example
//!
//! ```rust,no_run
//! use nostr_client::{ConnectionPool, Filter, query};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = Arc::new(ConnectionPool::default());
//!     let relays = vec![
//!         "wss://relay.damus.io".to_string(),
//!         "wss://nos.lol".to_string(),
//!     ];
//!
//!     let filter = Filter::new().kinds(vec![30023]).limit(50);
//!     let outcome = query(
//!         &pool,
//!         &relays,
//!         filter,
//!         Duration::from_secs(10),
//!         Duration::from_secs(30),
//!     )
//!     .await
//!     .unwrap();
//!
//!     println!(
//!         "{} events, {} rejected, {} relays failed",
//!         outcome.events.len(),
//!         outcome.rejected,
//!         outcome.relays_failed
//!     );
//! }
//! ```

mod aggregator;
mod connection;
mod error;
mod message;
mod pool;
mod worker;

pub use aggregator::{QueryOutcome, query};
pub use connection::{ConnectionConfig, ConnectionState, RelayConnection};
pub use error::{ClientError, Result};
pub use message::{ClientMessage, Filter, MessageError, RelayMessage};
pub use pool::{ConnectionPool, PoolConfig, PoolStats, RelayStats};
pub use worker::{EventHandler, SubscriptionWorker, WorkerConfig, WorkerState};

/// Generate a fresh subscription id.
///
/// Eight characters of a v4 UUID: short enough for relay limits, random
/// enough that reconnects and concurrent queries never collide.
pub fn generate_subscription_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_ids_are_short_and_unique() {
        let a = generate_subscription_id();
        let b = generate_subscription_id();
        assert_eq!(a.len(), 8);
        assert_eq!(b.len(), 8);
        assert_ne!(a, b);
    }
}
