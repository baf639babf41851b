//! Fan-out query aggregation.
//!
//! One filter, many relays: each relay gets its own concurrent leg that
//! subscribes, buffers EVENT frames until EOSE or its deadline, then closes
//! the subscription. Legs are independent — a relay that is down, slow, or
//! hostile only costs its own leg. The merge deduplicates by event id; since
//! ids are content hashes, the first verified occurrence of an id is as good
//! as any later one, so first wins unconditionally.

use crate::connection::RelayConnection;
use crate::error::{ClientError, Result};
use crate::generate_subscription_id;
use crate::message::{ClientMessage, Filter, RelayMessage};
use crate::pool::ConnectionPool;
use nostr_core::{Event, verify_event};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

/// Result of a fan-out query.
#[derive(Debug, Default)]
pub struct QueryOutcome {
    /// Verified events, deduplicated by id, first occurrence wins
    pub events: Vec<Event>,
    /// Relay each event id was first seen on, for attribution downstream
    pub sources: HashMap<String, String>,
    /// Events dropped because verification failed
    pub rejected: u64,
    /// Relays the query was issued against
    pub relays_queried: usize,
    /// Legs that could not connect or subscribe
    pub relays_failed: usize,
}

/// Issue one filter to a set of relays and merge the results.
///
/// Each relay leg runs concurrently and settles on the first of: EOSE,
/// `per_relay_timeout`, or the overall deadline. The overall deadline takes
/// precedence even over legs mid-read — those legs are abandoned and their
/// connections reclaimed by a later cleanup pass. Per-relay failures are
/// skip decisions, never query failures; the only hard error is an empty
/// relay list.
pub async fn query(
    pool: &Arc<ConnectionPool>,
    relay_urls: &[String],
    filter: Filter,
    per_relay_timeout: Duration,
    overall_timeout: Duration,
) -> Result<QueryOutcome> {
    if relay_urls.is_empty() {
        return Err(ClientError::NoRelays);
    }

    let overall_deadline = Instant::now() + overall_timeout;

    let mut legs = JoinSet::new();
    for url in relay_urls {
        let pool = Arc::clone(pool);
        let url = url.clone();
        let filter = filter.clone();
        legs.spawn(async move { run_leg(&pool, &url, filter, per_relay_timeout).await });
    }

    let mut outcome = QueryOutcome {
        relays_queried: relay_urls.len(),
        ..Default::default()
    };
    let mut seen: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            settled = legs.join_next() => {
                let Some(settled) = settled else { break };
                match settled {
                    Ok(leg) => {
                        if leg.failed {
                            outcome.relays_failed += 1;
                        }
                        outcome.rejected += leg.rejected;
                        for event in leg.events {
                            if seen.insert(event.id.clone()) {
                                outcome.sources.insert(event.id.clone(), leg.url.clone());
                                outcome.events.push(event);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("query leg panicked: {}", e);
                        outcome.relays_failed += 1;
                    }
                }
            }
            _ = sleep_until(overall_deadline) => {
                let abandoned = legs.len();
                if abandoned > 0 {
                    debug!("overall deadline reached, abandoning {} legs", abandoned);
                }
                legs.abort_all();
                break;
            }
        }
    }

    Ok(outcome)
}

struct LegOutcome {
    url: String,
    events: Vec<Event>,
    rejected: u64,
    failed: bool,
}

impl LegOutcome {
    fn failed(url: &str) -> Self {
        Self {
            url: url.to_string(),
            events: Vec::new(),
            rejected: 0,
            failed: true,
        }
    }
}

/// One relay's leg of the query: subscribe, drain until EOSE or deadline,
/// close the subscription.
async fn run_leg(
    pool: &ConnectionPool,
    url: &str,
    filter: Filter,
    per_relay_timeout: Duration,
) -> LegOutcome {
    let connection = match pool.get_connection(url).await {
        Ok(connection) => connection,
        Err(e) => {
            debug!("skipping {}: {}", url, e);
            return LegOutcome::failed(url);
        }
    };

    let subscription_id = generate_subscription_id();
    if let Err(e) = connection
        .send(&ClientMessage::req(subscription_id.as_str(), filter))
        .await
    {
        debug!("failed to subscribe on {}: {}", url, e);
        return LegOutcome::failed(url);
    }

    let mut leg = LegOutcome {
        url: url.to_string(),
        events: Vec::new(),
        rejected: 0,
        failed: false,
    };
    let deadline = Instant::now() + per_relay_timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("per-relay timeout for {}", url);
            break;
        }

        match connection.recv(remaining).await {
            Ok(Some(RelayMessage::Event {
                subscription_id: sub,
                event,
            })) if sub == subscription_id => match verify_event(&event) {
                Ok(true) => leg.events.push(event),
                _ => {
                    leg.rejected += 1;
                    debug!("dropping unverified event {} from {}", event.id, url);
                }
            },
            Ok(Some(RelayMessage::Eose {
                subscription_id: sub,
            })) if sub == subscription_id => break,
            Ok(Some(RelayMessage::Closed {
                subscription_id: sub,
                message,
            })) if sub == subscription_id => {
                debug!("{} closed subscription early: {}", url, message);
                break;
            }
            Ok(Some(RelayMessage::Notice { message })) => {
                debug!("notice from {}: {}", url, message);
            }
            Ok(Some(RelayMessage::Auth { .. })) => {
                debug!("auth challenge from {} left unanswered", url);
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => {
                // Keep whatever this relay already produced.
                debug!("connection to {} dropped mid-query: {}", url, e);
                return leg;
            }
        }
    }

    close_subscription(&connection, &subscription_id).await;
    leg
}

async fn close_subscription(connection: &RelayConnection, subscription_id: &str) {
    if let Err(e) = connection
        .send(&ClientMessage::close(subscription_id))
        .await
    {
        debug!("failed to close subscription {}: {}", subscription_id, e);
    }
}
