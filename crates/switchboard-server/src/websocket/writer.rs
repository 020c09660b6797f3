//! Per-connection writer task: drains the send queue into the socket and
//! drives the heartbeat.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::SinkExt;
use futures::stream::SplitSink;
use metrics::counter;
use switchboard_core::{Connection, Payload};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::connection::WsConnection;
use super::heartbeat::{Beat, Heartbeat, HeartbeatConfig};
use crate::metrics::WS_HEARTBEAT_TIMEOUTS_TOTAL;

fn to_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::Text((&*text).into()),
        Payload::Binary(data) => Message::Binary(data),
    }
}

/// Run until the connection closes or the socket fails.
///
/// Frames already queued when the connection closes are flushed before the
/// close frame.
pub async fn run_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Payload>,
    connection: Arc<WsConnection>,
    heartbeat: Option<HeartbeatConfig>,
) {
    let closed = connection.closed_token();
    let mut heartbeat = Heartbeat::new(heartbeat);

    loop {
        tokio::select! {
            biased;
            () = closed.cancelled() => break,
            maybe = rx.recv() => {
                let Some(payload) = maybe else { break };
                if let Err(e) = sink.send(to_message(payload)).await {
                    debug!(conn_id = %connection.id(), error = %e, "socket write failed");
                    connection.close().await;
                    return;
                }
            }
            beat = heartbeat.tick(&connection) => match beat {
                Beat::Ping => {
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        connection.close().await;
                        return;
                    }
                }
                Beat::TimedOut => {
                    warn!(
                        conn_id = %connection.id(),
                        silent_secs = connection.last_seen_elapsed().as_secs(),
                        "heartbeat timeout, closing connection"
                    );
                    counter!(WS_HEARTBEAT_TIMEOUTS_TOTAL).increment(1);
                    connection.expire();
                    break;
                }
            },
        }
    }

    let mut flushed = 0u32;
    while let Ok(payload) = rx.try_recv() {
        if sink.send(to_message(payload)).await.is_err() {
            return;
        }
        flushed += 1;
    }
    let _ = sink.send(Message::Close(None)).await;
    debug!(conn_id = %connection.id(), flushed, "writer finished");
}
