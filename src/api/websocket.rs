//! WebSocket Support for Real-time Game Events
//!
//! Streams the engine's event feed to connected clients:
//! - Round lifecycle (waiting, started, multiplier ticks, crash)
//! - Bet activity (placed, cashed out, cancelled, settled)
//! - Scheduler faults
//!
//! Every connection gets a full game snapshot on connect so clients can
//! paint immediately, then live events from that point on.

use super::handlers::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket endpoint handler
/// GET /ws
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

/// Handle individual WebSocket connection
async fn handle_connection(state: Arc<AppState>, socket: WebSocket) {
    let client_id = generate_client_id();
    let connected = state.ws_clients.fetch_add(1, Ordering::SeqCst) + 1;
    info!(
        "🔌 WebSocket client {} connected (total: {})",
        client_id, connected
    );

    let (mut sender, mut receiver) = socket.split();
    let mut events = state.engine.subscribe();

    // First frame is a full snapshot so the client can paint immediately.
    let welcome = serde_json::json!({
        "type": "snapshot",
        "state": state.engine.snapshot(),
    });
    if sender.send(Message::Text(welcome.to_string())).await.is_err() {
        warn!("Failed to send snapshot to client {}", client_id);
        state.ws_clients.fetch_sub(1, Ordering::SeqCst);
        return;
    }

    // Delay the first heartbeat; the snapshot just proved the pipe works.
    let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let message = match serde_json::to_string(&event) {
                        Ok(text) => Message::Text(text),
                        Err(e) => {
                            error!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(message).await.is_err() {
                        debug!("Client {} disconnected", client_id);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "WebSocket client {} lagged, dropped {} events",
                        client_id, skipped
                    );
                }
                Err(RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Client {} closed the connection", client_id);
                    break;
                }
                Some(Ok(Message::Text(text))) => {
                    debug!("Received message from client {}: {}", client_id, text);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error from client {}: {}", client_id, e);
                    break;
                }
            },
            _ = heartbeat.tick() => {
                let frame = serde_json::json!({
                    "type": "heartbeat",
                    "timestamp": Utc::now().timestamp_millis(),
                });
                if sender.send(Message::Text(frame.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }

    let remaining = state.ws_clients.fetch_sub(1, Ordering::SeqCst) - 1;
    info!(
        "🔌 WebSocket client {} disconnected (remaining: {})",
        client_id, remaining
    );
}

/// Generate unique client ID
fn generate_client_id() -> String {
    use std::sync::atomic::AtomicU64;
    static COUNTER: AtomicU64 = AtomicU64::new(1);

    format!("ws_{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}
