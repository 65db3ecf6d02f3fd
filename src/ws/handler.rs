//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The bus subscription is taken before the upgrade completes, so the
/// client sees every record appended after its request was accepted.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();
    let event_service = Arc::clone(&state.event_service);

    ws.on_upgrade(move |socket| run_connection(socket, event_rx, event_service))
}
