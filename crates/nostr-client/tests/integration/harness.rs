//! Test harness: a minimal in-process relay speaking just enough NIP-01 to
//! exercise the client (REQ -> stored EVENTs -> EOSE, then live EVENTs), plus
//! fixture helpers for signed events.

use futures::{SinkExt, StreamExt};
use nostr_core::{Event, EventTemplate, finalize_event};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

/// A scripted relay: serves its stored events on every REQ, then keeps the
/// subscription open and forwards pushed events until the connection dies.
pub struct MockRelay {
    addr: SocketAddr,
    live_tx: broadcast::Sender<Event>,
    kill_tx: broadcast::Sender<()>,
    connections: Arc<AtomicUsize>,
}

impl MockRelay {
    pub async fn start(stored: Vec<Event>) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (live_tx, _) = broadcast::channel(64);
        let (kill_tx, _) = broadcast::channel(4);
        let connections = Arc::new(AtomicUsize::new(0));

        let stored = Arc::new(stored);
        let accept_live = live_tx.clone();
        let accept_kill = kill_tx.clone();
        let accept_connections = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_connection(
                    stream,
                    Arc::clone(&stored),
                    accept_live.subscribe(),
                    accept_kill.subscribe(),
                ));
            }
        });

        Self {
            addr,
            live_tx,
            kill_tx,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Deliver an event on every open subscription.
    pub fn push(&self, event: Event) {
        let _ = self.live_tx.send(event);
    }

    /// Abruptly drop every open connection, as a crashing relay would.
    pub fn drop_connections(&self) {
        let _ = self.kill_tx.send(());
    }

    /// Total connections accepted since start.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve_connection(
    stream: TcpStream,
    stored: Arc<Vec<Event>>,
    mut live_rx: broadcast::Receiver<Event>,
    mut kill_rx: broadcast::Receiver<()>,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    let mut subscription: Option<String> = None;

    loop {
        tokio::select! {
            _ = kill_rx.recv() => {
                // Vanish without a close handshake.
                return;
            }
            event = live_rx.recv() => {
                if let (Ok(event), Some(sub)) = (event, subscription.as_ref()) {
                    let frame = serde_json::json!(["EVENT", sub, event]).to_string();
                    if ws.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
            }
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(value) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        let Some(arr) = value.as_array() else { continue };
                        match arr.first().and_then(Value::as_str) {
                            Some("REQ") if arr.len() >= 3 => {
                                let sub = arr[1].as_str().unwrap_or_default().to_string();
                                for event in stored.iter() {
                                    let frame =
                                        serde_json::json!(["EVENT", sub, event]).to_string();
                                    if ws.send(Message::Text(frame)).await.is_err() {
                                        return;
                                    }
                                }
                                let eose = serde_json::json!(["EOSE", sub]).to_string();
                                if ws.send(Message::Text(eose)).await.is_err() {
                                    return;
                                }
                                subscription = Some(sub);
                            }
                            Some("CLOSE") => {
                                subscription = None;
                            }
                            _ => {}
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    _ => {}
                }
            }
        }
    }
}

/// A signed kind 1 note; distinct content yields a distinct id.
pub fn signed_note(secret_key: &[u8; 32], content: &str, created_at: u64) -> Event {
    finalize_event(
        &EventTemplate {
            kind: 1,
            tags: vec![],
            content: content.to_string(),
            created_at,
        },
        secret_key,
    )
    .unwrap()
}
