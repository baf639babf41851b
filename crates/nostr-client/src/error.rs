//! Client error types.
//!
//! The taxonomy mirrors how errors are handled, not where they come from:
//! connection-level errors are recoverable by caller-driven retry, protocol
//! errors drop the offending frame and keep the loop alive, and `NoRelays`
//! is the one genuinely fatal configuration error.

use thiserror::Error;

/// Client error type
#[derive(Error, Debug)]
pub enum ClientError {
    /// Relay unreachable or handshake failed; recoverable by retry
    #[error("connection error: {0}")]
    Connection(String),

    /// WebSocket-level failure on an established connection
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// An operation exceeded its deadline
    #[error("timeout: {0}")]
    Timeout(String),

    /// Send or receive attempted without an open connection
    #[error("not connected to relay")]
    NotConnected,

    /// URL is not a ws:// or wss:// relay address
    #[error("invalid relay URL: {0}")]
    InvalidUrl(String),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Malformed frame from a relay; dropped, loop continues
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No relay configured at all; the only fatal configuration error
    #[error("no relays configured")]
    NoRelays,
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;
