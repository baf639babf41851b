//! The event projector: verify, validate, deduplicate, map, persist.
//!
//! This is the sole writer of domain records. Every event goes through the
//! same gauntlet no matter which path delivered it — fan-out backfill, live
//! subscription, or manual re-fetch — so the pipeline's central invariant
//! holds everywhere: exactly one persisted record per distinct event id,
//! and re-delivery is a no-op that returns the existing record.

use crate::error::ProjectError;
use crate::record::DomainRecord;
use crate::store::Store;
use nostr_core::{Event, validate_event, verify_event};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Result of projecting one event.
#[derive(Debug, Clone)]
pub struct Projection {
    pub record: DomainRecord,
    /// False when the id was already in the store (re-delivery)
    pub newly_saved: bool,
}

/// Counters for observability; cheap to read at any time.
#[derive(Debug, Default)]
struct Counters {
    saved: AtomicU64,
    duplicates: AtomicU64,
    rejected_verification: AtomicU64,
    rejected_invalid: AtomicU64,
}

/// Snapshot of projector counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub saved: u64,
    pub duplicates: u64,
    pub rejected_verification: u64,
    pub rejected_invalid: u64,
}

/// Summary of a bulk projection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Newly persisted records
    pub saved: u64,
    /// Duplicates and discarded events (verification or mapping failures)
    pub skipped: u64,
    /// Database-level failures
    pub errors: u64,
}

impl BatchSummary {
    /// Fold another summary into this one.
    pub fn merge(&mut self, other: BatchSummary) {
        self.saved += other.saved;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// Maps raw events into domain records and persists them idempotently.
pub struct Projector {
    store: Arc<Store>,
    counters: Counters,
}

impl Projector {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            counters: Counters::default(),
        }
    }

    /// The store this projector writes to.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            saved: self.counters.saved.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            rejected_verification: self.counters.rejected_verification.load(Ordering::Relaxed),
            rejected_invalid: self.counters.rejected_invalid.load(Ordering::Relaxed),
        }
    }

    /// Project one event into its domain record.
    ///
    /// An id already in the store returns the existing record unchanged —
    /// no duplicate row, no error. Unverifiable or structurally invalid
    /// events are permanently discarded and counted.
    pub fn project(
        &self,
        event: &Event,
        source_relay: &str,
    ) -> Result<Projection, ProjectError> {
        self.admit(event)?;

        // Fast path for re-delivery; the insert below is the real arbiter
        // when two projectors race on the same id.
        if let Some(existing) = self.store.find_by_id(&event.id)? {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!("event {} already projected", event.id);
            return Ok(Projection {
                record: existing,
                newly_saved: false,
            });
        }

        let record = self.map(event)?;
        let newly_saved = self.store.insert(&record, event, source_relay)?;
        if newly_saved {
            self.counters.saved.fetch_add(1, Ordering::Relaxed);
            debug!("projected {} {}", record.type_name(), event.id);
        } else {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
        }

        Ok(Projection { record, newly_saved })
    }

    /// Project a batch, flushing persistence in one transaction.
    ///
    /// Callers control throughput by chunking their input to a fixed batch
    /// size before calling this. Individual bad events are skipped, never
    /// fatal; only database failures count as errors.
    pub fn project_batch(&self, events: &[Event], source_relay: &str) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let mut admitted = Vec::with_capacity(events.len());

        for event in events {
            if let Err(e) = self.admit(event) {
                debug!("skipping event in batch: {}", e);
                summary.skipped += 1;
                continue;
            }
            match self.map(event) {
                Ok(record) => {
                    admitted.push((record, event.clone(), source_relay.to_string()))
                }
                Err(e) => {
                    debug!("skipping unmappable event {}: {}", event.id, e);
                    summary.skipped += 1;
                }
            }
        }

        match self.store.insert_batch(&admitted) {
            Ok(saved) => {
                let duplicates = admitted.len() as u64 - saved;
                self.counters.saved.fetch_add(saved, Ordering::Relaxed);
                self.counters
                    .duplicates
                    .fetch_add(duplicates, Ordering::Relaxed);
                summary.saved += saved;
                summary.skipped += duplicates;
            }
            Err(e) => {
                warn!("batch flush failed: {}", e);
                summary.errors += admitted.len() as u64;
            }
        }

        summary
    }

    /// Structural and cryptographic admission checks.
    fn admit(&self, event: &Event) -> Result<(), ProjectError> {
        if !validate_event(event) {
            self.counters
                .rejected_invalid
                .fetch_add(1, Ordering::Relaxed);
            return Err(ProjectError::InvalidEvent(format!(
                "malformed id/pubkey/sig on event '{}'",
                event.id
            )));
        }
        match verify_event(event) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.counters
                    .rejected_verification
                    .fetch_add(1, Ordering::Relaxed);
                Err(ProjectError::Verification(event.id.clone()))
            }
            Err(e) => {
                self.counters
                    .rejected_invalid
                    .fetch_add(1, Ordering::Relaxed);
                Err(ProjectError::InvalidEvent(e.to_string()))
            }
        }
    }

    /// Kind-specific mapping, counting failures.
    fn map(&self, event: &Event) -> Result<DomainRecord, ProjectError> {
        DomainRecord::from_event(event).inspect_err(|_| {
            self.counters
                .rejected_invalid
                .fetch_add(1, Ordering::Relaxed);
        })
    }
}
