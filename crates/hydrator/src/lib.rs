//! Event projection into the local store.
//!
//! This crate is the write side of hydration: raw events arrive from the
//! fan-out aggregator or a streaming subscription worker, get verified and
//! mapped into typed domain records, and land in SQLite exactly once per
//! event id. Both delivery paths go through the same [`Projector`], so
//! idempotency holds no matter how an event reaches us — backfill, live
//! stream, or manual re-fetch.
//!
//! The `hydrator` binary wires the pieces together: `backfill` runs a
//! fan-out query and projects the result in batches; `stream` keeps one
//! subscription worker per configured relay feeding the shared projector.

mod config;
mod error;
mod projector;
mod record;
mod store;

pub use config::{ConfigError, HydratorConfig};
pub use error::ProjectError;
pub use projector::{BatchSummary, Projection, Projector, StatsSnapshot};
pub use record::{
    ArticleRecord, CommentRecord, DomainRecord, GenericRecord, HighlightRecord, MediaRecord,
};
pub use store::{Store, StoreConfig, StoreCounts};
