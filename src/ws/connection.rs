//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! answering commands and forwarding appended records.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use crate::api::dto::EventRecordDto;
use crate::domain::EventRecord;
use crate::service::EventService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them.
/// - Forwards every record from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<EventRecord>,
    event_service: Arc<EventService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(text.as_str(), &event_service).await;
                        if let Some(json) = encode(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(record) => {
                        let Some(json) = encode(&WsMessage::record_appended(record)) else {
                            continue;
                        };
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                        let Some(json) = encode(&WsMessage::lagged(n)) else {
                            continue;
                        };
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn encode(msg: &WsMessage) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode ws message");
            None
        }
    }
}

/// Handles a text message from the client and builds the reply.
async fn handle_text_message(text: &str, event_service: &EventService) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command message");
    }
    let name = msg
        .payload
        .get("command")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);
    let command = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(command) => command,
        Err(err) => {
            return match name {
                Some(name) if WsCommand::is_known(&name) => WsMessage::error(
                    msg.id,
                    400,
                    &format!("invalid arguments for {name}: {err}"),
                ),
                _ => WsMessage::error(msg.id, 404, "unknown command"),
            };
        }
    };

    match command {
        WsCommand::Ping => WsMessage::response(msg.id, serde_json::json!({"pong": true})),
        WsCommand::Replay { from, to } => {
            match event_service.query_by_time_range(from, to).await {
                Ok(records) => {
                    let count = records.len();
                    let records: Vec<EventRecordDto> =
                        records.into_iter().map(EventRecordDto::from).collect();
                    WsMessage::response(
                        msg.id,
                        serde_json::json!({"records": records, "count": count}),
                    )
                }
                Err(err) => WsMessage::error(msg.id, err.error_code(), &err.to_string()),
            }
        }
    }
}
