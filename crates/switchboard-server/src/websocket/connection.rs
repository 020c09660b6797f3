//! WebSocket connection state and the core transport traits over axum's
//! `WebSocket`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitStream;
use futures::StreamExt;
use metrics::counter;
use parking_lot::Mutex;
use switchboard_core::{
    AcceptError, Accepted, Connection, ConnectionId, FrameSource, Payload, PeerId, ReadError,
    Transport, WriteError,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::heartbeat::HeartbeatConfig;
use super::writer::run_writer;
use crate::metrics::WS_DROPPED_FRAMES_TOTAL;

/// Outbound half of a WebSocket connection.
///
/// `send` never waits on the socket: frames go into a bounded queue drained
/// by the connection's writer task.
pub struct WsConnection {
    id: ConnectionId,
    tx: mpsc::Sender<Payload>,
    closed: CancellationToken,
    connected_at: Instant,
    /// Last inbound frame of any kind, pongs included.
    last_seen: Mutex<Instant>,
    timed_out: AtomicBool,
    dropped_frames: AtomicU64,
}

impl WsConnection {
    /// Create a connection that enqueues into `tx`.
    pub fn new(tx: mpsc::Sender<Payload>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            tx,
            closed: CancellationToken::new(),
            connected_at: now,
            last_seen: Mutex::new(now),
            timed_out: AtomicBool::new(false),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Close the connection because the peer went silent.
    pub fn expire(&self) {
        self.timed_out.store(true, Ordering::SeqCst);
        self.closed.cancel();
    }

    /// Whether the heartbeat closed this connection.
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled when the connection closes.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Frames refused because the queue was full or closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    fn record_drop(&self) {
        let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
        counter!(WS_DROPPED_FRAMES_TOTAL).increment(1);
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send(&self, payload: Payload) -> Result<(), WriteError> {
        if self.closed.is_cancelled() {
            return Err(WriteError::Closed);
        }
        match self.tx.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.record_drop();
                Err(WriteError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                self.record_drop();
                Err(WriteError::Closed)
            }
        }
    }

    async fn close(&self) {
        self.closed.cancel();
    }
}

/// Inbound half of a WebSocket connection.
pub struct WsFrames {
    stream: SplitStream<WebSocket>,
    connection: Arc<WsConnection>,
}

#[async_trait]
impl FrameSource for WsFrames {
    async fn receive(&mut self) -> Result<Option<Payload>, ReadError> {
        let closed = self.connection.closed_token();
        loop {
            let msg = tokio::select! {
                biased;
                () = closed.cancelled() => {
                    return if self.connection.timed_out() {
                        Err(ReadError::HeartbeatTimeout)
                    } else {
                        Ok(None)
                    };
                }
                msg = self.stream.next() => msg,
            };

            let Some(msg) = msg else { return Ok(None) };
            let msg = msg.map_err(|e| ReadError::Transport(e.to_string()))?;
            self.connection.mark_alive();
            match msg {
                Message::Text(text) => return Ok(Some(Payload::text(text.as_str()))),
                Message::Binary(data) => return Ok(Some(Payload::Binary(data))),
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(frame) => {
                    debug!(conn_id = %self.connection.id(), ?frame, "client sent close frame");
                    return Ok(None);
                }
            }
        }
    }
}

/// Per-connection transport options.
#[derive(Clone, Debug)]
pub struct WsOptions {
    /// Outbound queue capacity.
    pub send_queue_capacity: usize,
    /// Ping schedule; `None` disables the heartbeat.
    pub heartbeat: Option<HeartbeatConfig>,
}

/// Builds the first frame sent to a newly accepted connection.
pub type Greeting = fn(&PeerId, &ConnectionId) -> Payload;

/// An upgraded socket waiting to be accepted into a session.
pub struct WsTransport {
    socket: WebSocket,
    options: WsOptions,
    greeting: Option<Greeting>,
    shutdown: CancellationToken,
}

impl WsTransport {
    /// Wrap an upgraded socket.
    pub fn new(socket: WebSocket, options: WsOptions, shutdown: CancellationToken) -> Self {
        Self {
            socket,
            options,
            greeting: None,
            shutdown,
        }
    }

    /// Send `greeting`'s frame before anything else the client receives.
    #[must_use]
    pub fn with_greeting(mut self, greeting: Greeting) -> Self {
        self.greeting = Some(greeting);
        self
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Connection = WsConnection;
    type Frames = WsFrames;

    async fn accept(self, peer: &PeerId) -> Result<Accepted<WsConnection, WsFrames>, AcceptError> {
        if self.shutdown.is_cancelled() {
            return Err(AcceptError::Rejected("server shutting down".into()));
        }

        let (sink, stream) = self.socket.split();
        let (tx, rx) = mpsc::channel(self.options.send_queue_capacity.max(1));
        let connection = Arc::new(WsConnection::new(tx));

        if let Some(greeting) = self.greeting {
            connection
                .send(greeting(peer, connection.id()))
                .await
                .map_err(|e| AcceptError::Handshake(e.to_string()))?;
        }

        let _writer = tokio::spawn(run_writer(
            sink,
            rx,
            Arc::clone(&connection),
            self.options.heartbeat,
        ));

        info!(peer_id = %peer, conn_id = %connection.id(), "websocket accepted");
        let frames = WsFrames {
            stream,
            connection: Arc::clone(&connection),
        };
        Ok(Accepted { connection, frames })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn make_connection(capacity: usize) -> (WsConnection, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity);
        (WsConnection::new(tx), rx)
    }

    #[tokio::test]
    async fn send_enqueues_in_order() {
        let (conn, mut rx) = make_connection(8);
        for i in 0..3 {
            conn.send(Payload::text(format!("m{i}"))).await.unwrap();
        }
        for i in 0..3 {
            assert_eq!(rx.recv().await, Some(Payload::text(format!("m{i}"))));
        }
    }

    #[tokio::test]
    async fn full_queue_fails_without_waiting() {
        let (conn, _rx) = make_connection(1);
        conn.send(Payload::text("first")).await.unwrap();
        assert_matches!(conn.send(Payload::text("second")).await, Err(WriteError::QueueFull));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn dropped_writer_is_closed() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert_matches!(conn.send(Payload::text("x")).await, Err(WriteError::Closed));
    }

    #[tokio::test]
    async fn close_rejects_further_writes() {
        let (conn, _rx) = make_connection(4);
        conn.close().await;
        assert!(conn.is_closed());
        assert!(!conn.timed_out());
        assert_matches!(conn.send(Payload::text("x")).await, Err(WriteError::Closed));
    }

    #[tokio::test]
    async fn expire_marks_timeout() {
        let (conn, _rx) = make_connection(4);
        conn.expire();
        assert!(conn.is_closed());
        assert!(conn.timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn mark_alive_resets_silence() {
        let (conn, _rx) = make_connection(4);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(conn.last_seen_elapsed() >= Duration::from_secs(10));
        conn.mark_alive();
        assert!(conn.last_seen_elapsed() < Duration::from_secs(1));
        assert!(conn.age() >= Duration::from_secs(10));
    }
}
