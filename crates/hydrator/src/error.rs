//! Projection error types.

use thiserror::Error;

/// Errors that can occur while projecting an event.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// A required field is missing or malformed; the event is permanently
    /// discarded
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Id or signature verification failed; the event is permanently
    /// discarded and counted
    #[error("verification failed for event {0}")]
    Verification(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool error
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
