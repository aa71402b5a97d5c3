//! WebSocket transport
//!
//! Each connection gets a writer task (drains the outbound queue, sends
//! periodic pings) and a reader task (decodes text frames and forwards
//! them to the coordinator). When either side finishes the connection is
//! reported as disconnected.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use lp_protocol::{decode_event, encode_event, ClientEvent, ConnectionId, ServerEvent};

use super::AppState;

/// WebSocket upgrade handler
pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = ConnectionId::generate();
    let (outbound_tx, outbound_rx) =
        mpsc::channel::<ServerEvent>(state.config.outbound_queue_capacity);

    if state
        .coordinator
        .connected(id.clone(), outbound_tx)
        .await
        .is_err()
    {
        tracing::warn!("Coordinator unavailable, dropping WebSocket client {}", id);
        return;
    }
    tracing::info!("WebSocket client connected: {}", id);

    let (ws_tx, ws_rx) = socket.split();

    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        outbound_rx,
        state.config.heartbeat_interval,
        id.clone(),
    ));
    let mut reader = tokio::spawn(read_loop(ws_rx, state.clone(), id.clone()));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
        _ = state.shutdown.cancelled() => {
            writer.abort();
            reader.abort();
        }
    }

    if state.coordinator.disconnected(id.clone()).await.is_err() {
        tracing::debug!("Coordinator already stopped when {} disconnected", id);
    }
    tracing::info!("WebSocket client disconnected: {}", id);
}

async fn write_loop(
    mut ws_tx: futures::stream::SplitSink<WebSocket, WsMessage>,
    mut outbound_rx: mpsc::Receiver<ServerEvent>,
    heartbeat: std::time::Duration,
    id: ConnectionId,
) {
    let mut ping_interval = tokio::time::interval(heartbeat);
    ping_interval.tick().await; // consume first immediate tick

    loop {
        tokio::select! {
            event = outbound_rx.recv() => {
                let Some(event) = event else {
                    // Coordinator dropped our queue
                    break;
                };
                let text = match encode_event(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to encode {} for {}: {}", event.name(), id, e);
                        continue;
                    }
                };
                if ws_tx.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if ws_tx.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
                tracing::trace!("Sent ping to {}", id);
            }
        }
    }

    let _ = ws_tx.close().await;
}

async fn read_loop(
    mut ws_rx: futures::stream::SplitStream<WebSocket>,
    state: AppState,
    id: ConnectionId,
) {
    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            WsMessage::Text(text) => match decode_event::<ClientEvent>(&text) {
                Ok(event) => {
                    if state
                        .coordinator
                        .client_event(id.clone(), event)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Dropping malformed event from {}: {}", id, e);
                }
            },
            WsMessage::Close(_) => break,
            // axum answers pings itself; pongs need no handling
            _ => {}
        }
    }
}
