//! Upgrade handlers for the chat and signaling endpoints.
//!
//! Both endpoints share one upgrade path: apply the frame size limit, wrap
//! the socket in a [`WsTransport`] and hand it to the endpoint's
//! [`SessionController`] under a child of the shutdown token.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use switchboard_core::{AcceptError, ConnectionId, Payload, PeerId, SessionController};
use tracing::{debug, warn};

use super::connection::{Greeting, WsOptions, WsTransport};
use super::heartbeat::HeartbeatConfig;
use crate::server::AppState;

/// Query string accepted by `/signal`.
#[derive(Debug, Default, Deserialize)]
pub struct SignalQuery {
    /// Caller-chosen peer ID. A fresh one is generated when absent or empty.
    pub peer: Option<String>,
}

impl SignalQuery {
    /// The peer this signaling session runs as.
    pub fn peer_id(self) -> PeerId {
        match self.peer {
            Some(peer) if !peer.trim().is_empty() => PeerId::from(peer.trim()),
            _ => PeerId::new(),
        }
    }
}

/// First frame on a signaling connection: tells the client who it is.
pub fn signaling_greeting(peer: &PeerId, conn_id: &ConnectionId) -> Payload {
    let body = json!({
        "type": "connection.established",
        "peerId": peer,
        "connectionId": conn_id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    Payload::text(body.to_string())
}

/// GET /ws/{user_id}
pub async fn chat_handler(
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    let controller = state.chat.clone();
    upgrade(ws, state, controller, PeerId::from(user_id), None)
}

/// GET /signal?peer=...
pub async fn signal_handler(
    Query(query): Query<SignalQuery>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    let controller = state.signaling.clone();
    upgrade(ws, state, controller, query.peer_id(), Some(signaling_greeting))
}

fn upgrade(
    ws: WebSocketUpgrade,
    state: AppState,
    controller: SessionController,
    peer: PeerId,
    greeting: Option<Greeting>,
) -> Response {
    let options = WsOptions {
        send_queue_capacity: state.config.send_queue_capacity,
        heartbeat: HeartbeatConfig::from_parts(
            state.config.heartbeat_interval(),
            state.config.heartbeat_timeout(),
        ),
    };
    let failed_peer = peer.clone();

    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |e: axum::Error| {
            let err = AcceptError::Handshake(e.to_string());
            warn!(peer_id = %failed_peer, error = %err, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            let mut transport = WsTransport::new(socket, options, state.shutdown.token());
            if let Some(greeting) = greeting {
                transport = transport.with_greeting(greeting);
            }
            let cancel = state.shutdown.child_token();
            if let Ok(summary) = controller.run(peer, transport, cancel).await {
                debug!(
                    conn_id = %summary.connection_id,
                    end = ?summary.end,
                    frames = summary.frames_received,
                    "session finished"
                );
            }
        })
}
