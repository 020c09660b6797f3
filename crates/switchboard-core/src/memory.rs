//! In-process transport.
//!
//! [`pair`] returns the server half (a [`MemoryTransport`] to hand to
//! [`SessionController::run`](crate::lifecycle::SessionController::run)) and
//! the client half (a [`MemoryPeer`] that plays the remote user). Everything
//! travels over unbounded tokio channels, so ordering matches call order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{AcceptError, ReadError, WriteError};
use crate::ids::{ConnectionId, PeerId};
use crate::payload::Payload;
use crate::transport::{Accepted, Connection, FrameSource, Transport};

type Inbound = Result<Payload, ReadError>;

/// Outbound half of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Payload>,
    closed: CancellationToken,
    fail_writes: AtomicBool,
    write_attempts: AtomicUsize,
}

impl MemoryConnection {
    fn new(outbound: mpsc::UnboundedSender<Payload>, closed: CancellationToken) -> Self {
        Self {
            id: ConnectionId::new(),
            outbound,
            closed,
            fail_writes: AtomicBool::new(false),
            write_attempts: AtomicUsize::new(0),
        }
    }

    /// A connection with no remote end. Every write fails with
    /// [`WriteError::Closed`].
    pub fn detached() -> Arc<Self> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(Self::new(tx, CancellationToken::new()))
    }

    /// Make subsequent writes fail with a transport error (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `send` calls made on this connection, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Whether [`Connection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send(&self, payload: Payload) -> Result<(), WriteError> {
        let _ = self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WriteError::Transport("injected write failure".into()));
        }
        if self.closed.is_cancelled() {
            return Err(WriteError::Closed);
        }
        self.outbound.send(payload).map_err(|_| WriteError::Closed)
    }

    async fn close(&self) {
        self.closed.cancel();
    }
}

/// Inbound half of an in-memory connection.
pub struct MemoryFrames {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    closed: CancellationToken,
}

#[async_trait]
impl FrameSource for MemoryFrames {
    async fn receive(&mut self) -> Result<Option<Payload>, ReadError> {
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Ok(None),
            item = self.inbound.recv() => item.transpose(),
        }
    }
}

enum Pending {
    Ready(Arc<MemoryConnection>, MemoryFrames),
    Rejected(String),
}

/// Server half of an in-memory connection, waiting to be accepted.
pub struct MemoryTransport {
    pending: Pending,
}

impl MemoryTransport {
    /// A transport whose accept always fails with [`AcceptError::Rejected`].
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            pending: Pending::Rejected(reason.into()),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Connection = MemoryConnection;
    type Frames = MemoryFrames;

    async fn accept(
        self,
        peer: &PeerId,
    ) -> Result<Accepted<MemoryConnection, MemoryFrames>, AcceptError> {
        match self.pending {
            Pending::Ready(connection, frames) => {
                debug!(peer_id = %peer, conn_id = %connection.id(), "memory transport accepted");
                Ok(Accepted { connection, frames })
            }
            Pending::Rejected(reason) => Err(AcceptError::Rejected(reason)),
        }
    }
}

/// Client half: the remote user's view of an in-memory connection.
pub struct MemoryPeer {
    connection: Arc<MemoryConnection>,
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    outbound: mpsc::UnboundedReceiver<Payload>,
    closed: CancellationToken,
}

impl MemoryPeer {
    /// Identity of the server-side connection.
    pub fn connection_id(&self) -> &ConnectionId {
        self.connection.id()
    }

    /// Server-side connection handle, for failure injection.
    pub fn connection(&self) -> &Arc<MemoryConnection> {
        &self.connection
    }

    /// Send a text frame to the server. Ignored after [`disconnect`](Self::disconnect).
    pub fn send_text(&self, text: &str) {
        self.send(Payload::text(text));
    }

    /// Send a frame to the server. Ignored after [`disconnect`](Self::disconnect).
    pub fn send(&self, payload: Payload) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(payload));
        }
    }

    /// Make the server's next read fail with `err`.
    pub fn fail_read(&self, err: ReadError) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Err(err));
        }
    }

    /// Close from the client side. The server reads a clean close once it has
    /// drained frames already sent.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    /// Next frame written by the server. `None` once the server has closed the
    /// connection and every queued frame has been read.
    pub async fn recv(&mut self) -> Option<Payload> {
        tokio::select! {
            biased;
            item = self.outbound.recv() => item,
            () = self.closed.cancelled() => self.outbound.try_recv().ok(),
        }
    }

    /// Next already-written frame, without waiting.
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.outbound.try_recv().ok()
    }

    /// Drain every already-written text frame.
    pub fn drain_text(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(p) = self.try_recv() {
            if let Some(t) = p.as_text() {
                out.push(t.to_owned());
            }
        }
        out
    }

    /// Whether the server has closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Create a connected transport/peer pair.
pub fn pair() -> (MemoryTransport, MemoryPeer) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();
    let connection = Arc::new(MemoryConnection::new(out_tx, closed.clone()));
    let frames = MemoryFrames {
        inbound: in_rx,
        closed: closed.clone(),
    };
    let transport = MemoryTransport {
        pending: Pending::Ready(Arc::clone(&connection), frames),
    };
    let peer = MemoryPeer {
        connection,
        inbound: Some(in_tx),
        outbound: out_rx,
        closed,
    };
    (transport, peer)
}
