//! WebSocket push channel for editor sessions.
//!
//! `/api/v1/push/{session_id}` upgrades to a WebSocket that receives every
//! [`PushEvent`] addressed to that session as a JSON text frame
//! (`webhook-received`, `webhook-deleted`). Clients may send
//! `{"type":"ping"}` and get `{"type":"pong"}` back.
//!
//! Lagged receivers are handled gracefully: the handler logs a warning and
//! keeps going. Push delivery is best-effort.
//!
//! [`PushEvent`]: testhook_types::event::PushEvent

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::state::AppState;

/// Incoming command from a WebSocket client.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    Ping,
}

/// GET /api/v1/push/{session_id} - Upgrade to the session's push channel.
pub async fn push_ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Subscribe before the upgrade completes so no event is missed in between.
    let event_rx = state.push_bus.subscribe();
    ws.on_upgrade(move |socket| handle_push_connection(socket, session_id, event_rx))
}

async fn handle_push_connection(
    socket: WebSocket,
    session_id: String,
    mut event_rx: broadcast::Receiver<testhook_types::event::SessionEvent>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    tracing::debug!(%session_id, "push session connected");

    loop {
        tokio::select! {
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) if event.session_id == session_id => {
                        match serde_json::to_string(&event.event) {
                            Ok(json) => {
                                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::warn!("Failed to serialize PushEvent: {err}");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            %session_id,
                            skipped = n,
                            "push subscriber lagged, skipping {n} events"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsCommand>(&text) {
                            Ok(WsCommand::Ping) => {
                                let pong = serde_json::json!({ "type": "pong" }).to_string();
                                if ws_sender.send(Message::Text(pong.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::debug!(%session_id, "Ignoring malformed push command: {err}");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(%session_id, "push session closed");
}
