//! Relay protocol frames.
//!
//! NIP-01 messages as JSON arrays, client role only:
//! - Client to relay: `["REQ", ...]`, `["EVENT", ...]`, `["CLOSE", ...]`
//! - Relay to client: `["EVENT", ...]`, `["EOSE", ...]`, `["OK", ...]`,
//!   `["NOTICE", ...]`, `["CLOSED", ...]`, `["AUTH", ...]`
//!
//! AUTH challenges are parsed and surfaced like any other frame; answering
//! them is the caller's decision, never automatic.

use nostr_core::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when parsing relay frames.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field: {0}")]
    MissingField(String),
}

/// Messages sent from client to relay.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// Publish an event: `["EVENT", <event>]`
    Event(Event),

    /// Open a subscription: `["REQ", <subscription_id>, <filter>...]`
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },

    /// Close a subscription: `["CLOSE", <subscription_id>]`
    Close { subscription_id: String },
}

impl ClientMessage {
    /// A REQ frame with a single filter.
    pub fn req(subscription_id: impl Into<String>, filter: Filter) -> Self {
        ClientMessage::Req {
            subscription_id: subscription_id.into(),
            filters: vec![filter],
        }
    }

    /// A CLOSE frame.
    pub fn close(subscription_id: impl Into<String>) -> Self {
        ClientMessage::Close {
            subscription_id: subscription_id.into(),
        }
    }

    /// Serialize to the JSON array wire form.
    pub fn to_json(&self) -> Result<String, MessageError> {
        let value = match self {
            ClientMessage::Event(event) => serde_json::json!(["EVENT", event]),
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let mut arr: Vec<Value> = vec![
                    Value::String("REQ".to_string()),
                    Value::String(subscription_id.clone()),
                ];
                for filter in filters {
                    arr.push(serde_json::to_value(filter)?);
                }
                Value::Array(arr)
            }
            ClientMessage::Close { subscription_id } => {
                serde_json::json!(["CLOSE", subscription_id])
            }
        };
        Ok(value.to_string())
    }
}

/// Frames received from a relay.
#[derive(Debug, Clone)]
pub enum RelayMessage {
    /// Event matching a subscription: `["EVENT", <subscription_id>, <event>]`
    Event {
        subscription_id: String,
        event: Event,
    },

    /// Command result: `["OK", <event_id>, <accepted>, <message>]`
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },

    /// End of stored events: `["EOSE", <subscription_id>]`
    Eose { subscription_id: String },

    /// Subscription closed by the relay: `["CLOSED", <subscription_id>, <message>]`
    Closed {
        subscription_id: String,
        message: String,
    },

    /// Human-readable notice: `["NOTICE", <message>]`
    Notice { message: String },

    /// Authentication challenge (NIP-42): `["AUTH", <challenge>]`
    Auth { challenge: String },
}

impl RelayMessage {
    /// Parse a JSON frame from a relay.
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        let arr: Vec<Value> =
            serde_json::from_str(json).map_err(|e| MessageError::InvalidFormat(e.to_string()))?;

        if arr.is_empty() {
            return Err(MessageError::InvalidFormat("empty array".to_string()));
        }

        let msg_type = arr[0]
            .as_str()
            .ok_or_else(|| MessageError::InvalidFormat("first element not a string".to_string()))?;

        match msg_type {
            "EVENT" => {
                if arr.len() < 3 {
                    return Err(MessageError::MissingField(
                        "subscription_id or event".to_string(),
                    ));
                }
                let subscription_id = string_at(&arr, 1, "subscription_id")?;
                let event: Event = serde_json::from_value(arr[2].clone())?;
                Ok(RelayMessage::Event {
                    subscription_id,
                    event,
                })
            }
            "OK" => {
                if arr.len() < 4 {
                    return Err(MessageError::MissingField("OK fields".to_string()));
                }
                let event_id = string_at(&arr, 1, "event_id")?;
                let accepted = arr[2].as_bool().ok_or_else(|| {
                    MessageError::InvalidFormat("accepted not a boolean".to_string())
                })?;
                let message = arr[3].as_str().unwrap_or("").to_string();
                Ok(RelayMessage::Ok {
                    event_id,
                    accepted,
                    message,
                })
            }
            "EOSE" => {
                if arr.len() < 2 {
                    return Err(MessageError::MissingField("subscription_id".to_string()));
                }
                let subscription_id = string_at(&arr, 1, "subscription_id")?;
                Ok(RelayMessage::Eose { subscription_id })
            }
            "CLOSED" => {
                if arr.len() < 3 {
                    return Err(MessageError::MissingField("CLOSED fields".to_string()));
                }
                let subscription_id = string_at(&arr, 1, "subscription_id")?;
                let message = arr[2].as_str().unwrap_or("").to_string();
                Ok(RelayMessage::Closed {
                    subscription_id,
                    message,
                })
            }
            "NOTICE" => {
                if arr.len() < 2 {
                    return Err(MessageError::MissingField("message".to_string()));
                }
                let message = string_at(&arr, 1, "message")?;
                Ok(RelayMessage::Notice { message })
            }
            "AUTH" => {
                if arr.len() < 2 {
                    return Err(MessageError::MissingField("challenge".to_string()));
                }
                let challenge = string_at(&arr, 1, "challenge")?;
                Ok(RelayMessage::Auth { challenge })
            }
            _ => Err(MessageError::UnknownType(msg_type.to_string())),
        }
    }
}

fn string_at(arr: &[Value], index: usize, field: &str) -> Result<String, MessageError> {
    arr[index]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MessageError::InvalidFormat(format!("{} not a string", field)))
}

/// Subscription filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Event ids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    /// Author pubkeys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    /// Event kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,

    /// Events created at or after this timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,

    /// Events created at or before this timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,

    /// Maximum number of events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Tag-value filters keyed by `#`-prefixed tag name, e.g. `#e`, `#t`
    #[serde(flatten, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub tags: std::collections::HashMap<String, Vec<String>>,
}

impl Filter {
    /// Create a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by event ids.
    pub fn ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Filter by authors.
    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.authors = Some(authors);
        self
    }

    /// Filter by kinds.
    pub fn kinds(mut self, kinds: Vec<u16>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    /// Filter by events since a timestamp.
    pub fn since(mut self, timestamp: u64) -> Self {
        self.since = Some(timestamp);
        self
    }

    /// Filter by events until a timestamp.
    pub fn until(mut self, timestamp: u64) -> Self {
        self.until = Some(timestamp);
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Add a tag filter; `key` is the bare tag name without `#`.
    pub fn tag(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.tags.insert(format!("#{}", key.into()), values);
        self
    }
}
