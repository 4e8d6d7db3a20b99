//! WebSocket bridges for the caseboard and alert streams.
//!
//! Each connection gets its own channel-backed subscription on the
//! fan-out; this layer only pumps messages onto the socket. When the
//! socket closes (or the fan-out drops the subscriber for being slow) the
//! subscription is detached.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::state::AppState;
use wolftrace_core::{ChannelSink, StreamMessage};

const SOCKET_BUFFER: usize = 64;

/// GET /ws/caseboard
pub async fn caseboard_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let (sink, rx) = ChannelSink::new(SOCKET_BUFFER);
        let subscriber_id = state.engine.subscribe_caseboard(sink);
        pump(socket, rx, &state, &subscriber_id).await;
    })
}

/// GET /ws/alerts
pub async fn alert_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let (sink, rx) = ChannelSink::new(SOCKET_BUFFER);
        let subscriber_id = state.engine.subscribe_alerts(sink);
        pump(socket, rx, &state, &subscriber_id).await;
    })
}

async fn pump(
    socket: WebSocket,
    rx: mpsc::Receiver<StreamMessage>,
    state: &AppState,
    subscriber_id: &str,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut messages = ReceiverStream::new(rx);
    loop {
        tokio::select! {
            message = messages.next() => {
                let Some(message) = message else {
                    break;
                };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(error) => {
                        tracing::warn!(%error, "stream message failed to serialize");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients send nothing meaningful on these streams.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    state.engine.fanout().unsubscribe(subscriber_id);
    tracing::debug!(subscriber = subscriber_id, "websocket stream closed");
}
