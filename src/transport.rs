//! Transport: the single `/ws` endpoint, query-parameter handling, and the
//! per-connection reader/writer tasks that sit between the socket and a
//! [`Client`] actor.
//!
//! Grounded on `services/server`'s `ws_forwarder.rs`/`ws_common.rs` shape
//! (split socket, a writer task fed by an mpsc channel plus a ping
//! interval, a reader loop on the main task) generalized from that auth
//! handshake to this spec's query-parameter handshake.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::client::{Client, OUTBOUND_BUFFER};
use crate::events;
use crate::hub::spawn_hub;
use crate::protocol::Event;
use crate::state::AppState;

/// Pings every ~27s; a missing pong within 30s closes the socket.
const PING_INTERVAL: Duration = Duration::from_secs(27);
const PONG_TIMEOUT: Duration = Duration::from_secs(30);

/// Close code sent when the `name` query parameter is missing or empty.
const MISSING_NAME_CLOSE_CODE: u16 = 4001;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    name: Option<String>,
    space: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, params: ConnectParams) {
    let name = match params.name.filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => {
            let frame = CloseFrame {
                code: MISSING_NAME_CLOSE_CODE,
                reason: "name query parameter is required".into(),
            };
            let _ = socket.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    let hub = match params.space.filter(|s| !s.is_empty()) {
        None => state.cluster.general(),
        Some(space) => match state.cluster.get(&space).await {
            Some(hub) => hub,
            None => {
                let hub = spawn_hub(space.clone());
                state.cluster.add(hub.clone()).await;
                state
                    .cluster
                    .general()
                    .emit(&Event::new_hub_created(space))
                    .await;
                hub
            }
        },
    };

    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let client = Client::new(name.clone(), outbound_tx, hub.clone(), state.cluster.clone());
    client.join_initial(hub).await;

    let (ws_tx, mut ws_rx) = socket.split();
    let last_pong = Arc::new(Mutex::new(Instant::now()));
    let shutdown_rx = state.shutdown.subscribe();

    let writer = tokio::spawn(run_writer(ws_tx, outbound_rx, last_pong.clone(), shutdown_rx));

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<Event>(&text) {
                Ok(event) => {
                    let client = client.clone();
                    let key_queue = state.key_queue.clone();
                    // Spawned so a blocking reply-request handler never stalls
                    // this client's next inbound frame.
                    tokio::spawn(async move { events::dispatch(&client, &key_queue, event).await });
                }
                Err(error) => {
                    warn!(client = %name, %error, "discarding malformed envelope");
                }
            },
            Ok(Message::Pong(_)) => {
                *last_pong.lock().await = Instant::now();
            }
            Ok(Message::Close(_)) => break,
            Err(error) => {
                warn!(client = %name, %error, "websocket read error");
                break;
            }
            Ok(Message::Binary(_) | Message::Ping(_)) => {}
        }
    }

    writer.abort();
    client.die().await;

    let last_hub = client.current_hub().await;
    if !last_hub.is_general() && last_hub.length().await == 0 {
        state.cluster.remove(&last_hub.id).await;
        last_hub.die().await;
    }
    info!(client = %name, "connection closed");
}

/// Drains `outbound_rx` onto the socket, emits a ping on `PING_INTERVAL`
/// and closes the socket if no pong has landed within `PONG_TIMEOUT`, and
/// sends a close frame when the process-wide shutdown signal fires.
async fn run_writer(
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<String>,
    last_pong: Arc<Mutex<Instant>>,
    mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(data) => {
                        if ws_tx.send(Message::Text(data.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping_interval.tick() => {
                if last_pong.lock().await.elapsed() > PONG_TIMEOUT {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            _ = shutdown_rx.recv() => {
                let frame = CloseFrame { code: 1000, reason: "server shutting down".into() };
                let _ = ws_tx.send(Message::Close(Some(frame))).await;
                break;
            }
        }
    }
}
