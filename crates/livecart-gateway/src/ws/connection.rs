use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocket, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use livecart_protocol::CloseReason;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::hub::{Client, ClientKind};
use crate::ws::pumps::{self, PumpSettings};
use crate::ws::send::close_message;

/// Pongs and other out-of-band writes waiting for the write pump.
const CONTROL_QUEUE_DEPTH: usize = 8;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Admin token; grants `customer_update` events.
    pub admin: Option<String>,
}

/// Axum handler: upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(kind) = resolve_kind(state.config.gateway.admin_token.as_deref(), params.admin.as_deref()) else {
        warn!("websocket refused: bad admin token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid admin token"})),
        )
            .into_response();
    };
    ws.on_upgrade(move |socket| run_connection(socket, state, kind))
}

/// `None` when a token was presented that does not match.
fn resolve_kind(expected: Option<&str>, presented: Option<&str>) -> Option<ClientKind> {
    match (expected, presented) {
        (_, None) => Some(ClientKind::Viewer),
        (Some(expected), Some(token)) if token == expected => Some(ClientKind::Admin),
        _ => None,
    }
}

/// Lives for the entire WS session: register, run both pumps, deregister.
async fn run_connection(mut socket: WebSocket, state: Arc<AppState>, kind: ClientKind) {
    let realtime = &state.config.realtime;
    let (client, queue) = Client::new(kind, realtime.queue_capacity);

    if state.hub.register(Arc::clone(&client)).is_err() {
        info!(client_id = %client.id(), "hub shut down, refusing connection");
        let _ = socket.send(close_message(CloseReason::Shutdown)).await;
        return;
    }
    info!(client_id = %client.id(), kind = kind.as_str(), "new WS connection");

    let settings = PumpSettings::from(realtime);
    let (sink, stream) = socket.split();
    let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);
    let missed = Arc::new(AtomicU32::new(0));

    let writer = tokio::spawn(pumps::write_pump(
        Arc::clone(&client),
        sink,
        queue,
        control_rx,
        Arc::clone(&missed),
        settings.clone(),
    ));
    let reader = tokio::spawn(pumps::read_pump(
        Arc::clone(&client),
        stream,
        control_tx,
        missed,
        settings,
    ));

    let (w, r) = tokio::join!(writer, reader);
    if let Err(e) = w.and(r) {
        warn!(client_id = %client.id(), error = %e, "pump task failed");
    }

    // no-op unless a pump panicked before recording a reason
    client.close(CloseReason::Normal);
    state.hub.deregister(client.id());
    info!(
        client_id = %client.id(),
        reason = client.close_reason().map(|r| r.as_str()).unwrap_or("unknown"),
        "WS connection closed"
    );
}
