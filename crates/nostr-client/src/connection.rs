//! Single relay connection management.
//!
//! One `RelayConnection` owns one duplex WebSocket to one relay. Receiving
//! is caller-driven: there is no background read task, no reply queue, and
//! no automatic reconnection here — retry policy belongs to the aggregator
//! and the subscription worker, which own the loops that talk to this type.
//!
//! WebSocket pings are answered transparently inside [`RelayConnection::recv`]
//! and never surface as frames. AUTH challenges do surface; answering them
//! is never automatic.

use crate::error::{ClientError, Result};
use crate::message::{ClientMessage, RelayMessage};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket open
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Socket open and usable
    Connected,
}

/// Relay connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Relay URL (ws:// or wss://)
    pub url: String,
    /// Handshake timeout
    pub connect_timeout: Duration,
}

impl ConnectionConfig {
    /// Config for a relay URL with the default handshake timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One WebSocket session to one relay.
pub struct RelayConnection {
    url: Url,
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    ws: Arc<Mutex<Option<WsStream>>>,
    /// Stamped on every frame in or out; the pool's staleness clock
    last_activity: Arc<RwLock<Instant>>,
}

impl RelayConnection {
    /// Create a new relay connection (does not connect yet).
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let url = Url::parse(&config.url)?;

        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ClientError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                url.scheme()
            )));
        }

        Ok(Self {
            url,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            ws: Arc::new(Mutex::new(None)),
            last_activity: Arc::new(RwLock::new(Instant::now())),
        })
    }

    /// Connect to the relay.
    ///
    /// Idempotent: calling connect on an already-connected relay is a no-op.
    /// Fails with [`ClientError::Connection`] or [`ClientError::Timeout`]
    /// when the handshake fails or exceeds the configured deadline.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == ConnectionState::Connected {
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        debug!("connecting to relay: {}", self.url);

        let ws_stream = match timeout(
            self.config.connect_timeout,
            connect_async(self.url.as_str()),
        )
        .await
        {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ClientError::Connection(format!(
                    "handshake with {} failed: {}",
                    self.url, e
                )));
            }
            Err(_) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ClientError::Timeout(format!(
                    "handshake with {} exceeded {:?}",
                    self.url, self.config.connect_timeout
                )));
            }
        };

        *self.ws.lock().await = Some(ws_stream);
        *self.state.write().await = ConnectionState::Connected;
        self.touch().await;

        info!("connected to relay: {}", self.url);
        Ok(())
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Check if connected.
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }

    /// Send a frame to the relay.
    ///
    /// Fails with [`ClientError::NotConnected`] when no socket is open. A
    /// transport failure marks the connection dead before propagating.
    pub async fn send(&self, msg: &ClientMessage) -> Result<()> {
        if !self.is_connected().await {
            return Err(ClientError::NotConnected);
        }

        let text = msg
            .to_json()
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        debug!("sending to {}: {}", self.url, text);

        let mut ws = self.ws.lock().await;
        let Some(stream) = ws.as_mut() else {
            return Err(ClientError::NotConnected);
        };

        match stream.send(Message::Text(text)).await {
            Ok(()) => {
                self.touch().await;
                Ok(())
            }
            Err(e) => {
                *ws = None;
                *self.state.write().await = ConnectionState::Disconnected;
                Err(ClientError::WebSocket(e.to_string()))
            }
        }
    }

    /// Receive the next frame from the relay, waiting at most `wait`.
    ///
    /// Returns `Ok(Some(frame))` for a parsed frame, `Ok(None)` when `wait`
    /// elapsed without one, and `Err` when the connection is dead (the
    /// caller decides whether to retry). Pings are answered in place and
    /// malformed frames are dropped with a warning; neither consumes the
    /// caller's patience beyond the shared deadline.
    pub async fn recv(&self, wait: Duration) -> Result<Option<RelayMessage>> {
        if !self.is_connected().await {
            return Err(ClientError::NotConnected);
        }

        let deadline = Instant::now() + wait;
        let mut ws = self.ws.lock().await;

        let outcome = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let Some(stream) = ws.as_mut() else {
                return Err(ClientError::NotConnected);
            };

            let item = match timeout(remaining, stream.next()).await {
                Ok(item) => item,
                Err(_) => return Ok(None),
            };

            match item {
                Some(Ok(Message::Text(text))) => {
                    self.touch().await;
                    match RelayMessage::from_json(&text) {
                        Ok(frame) => return Ok(Some(frame)),
                        Err(e) => {
                            warn!("dropping malformed frame from {}: {}", self.url, e);
                            continue;
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    self.touch().await;
                    if let Err(e) = stream.send(Message::Pong(payload)).await {
                        break Err(ClientError::WebSocket(e.to_string()));
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("relay closed connection: {}", self.url);
                    break Err(ClientError::Connection(format!(
                        "{} closed the connection",
                        self.url
                    )));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => break Err(ClientError::WebSocket(e.to_string())),
                None => {
                    break Err(ClientError::Connection(format!(
                        "{} stream ended",
                        self.url
                    )));
                }
            }
        };

        // Any path out of the loop means the socket is dead.
        *ws = None;
        *self.state.write().await = ConnectionState::Disconnected;
        outcome
    }

    /// Close the connection.
    pub async fn close(&self) -> Result<()> {
        let mut ws = self.ws.lock().await;
        if let Some(mut stream) = ws.take() {
            let _ = stream.close(None).await;
            debug!("closed connection to {}", self.url);
        }
        *self.state.write().await = ConnectionState::Disconnected;
        Ok(())
    }

    /// Relay URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Instant of the last frame in either direction.
    pub async fn last_activity(&self) -> Instant {
        *self.last_activity.read().await
    }

    async fn touch(&self) {
        *self.last_activity.write().await = Instant::now();
    }
}
