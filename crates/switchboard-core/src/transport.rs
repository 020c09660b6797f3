//! Transport capability traits.
//!
//! A transport kind (WebSocket, in-memory, ...) supplies three pieces:
//!
//! - a [`Transport`] that performs the accept handshake for one peer
//! - the outbound [`Connection`] handle that the registry stores and the
//!   router writes to
//! - the inbound [`FrameSource`] owned by that connection's session task

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{AcceptError, ReadError, WriteError};
use crate::ids::{ConnectionId, PeerId};
use crate::payload::Payload;

/// Outbound half of one live connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Identity of this connection.
    fn id(&self) -> &ConnectionId;

    /// Write one frame. Frames written to the same connection are delivered
    /// in call order.
    async fn send(&self, payload: Payload) -> Result<(), WriteError>;

    /// Close the transport. Unblocks a pending [`FrameSource::receive`] on the
    /// paired inbound half. Idempotent.
    async fn close(&self);
}

/// Inbound half of one live connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next inbound frame.
    ///
    /// `Ok(None)` means the peer closed cleanly (or the connection was closed
    /// locally). `Err` means the transport failed; either way the session is
    /// over.
    async fn receive(&mut self) -> Result<Option<Payload>, ReadError>;
}

/// Result of a successful accept: both halves of the new connection.
pub struct Accepted<C, F> {
    /// Outbound handle, shared with the registry.
    pub connection: Arc<C>,
    /// Inbound frames, owned by the session task.
    pub frames: F,
}

/// A pending inbound connection request.
#[async_trait]
pub trait Transport: Send {
    /// Outbound half produced by this transport.
    type Connection: Connection + 'static;
    /// Inbound half produced by this transport.
    type Frames: FrameSource + 'static;

    /// Complete the transport-level handshake for `peer`.
    async fn accept(
        self,
        peer: &PeerId,
    ) -> Result<Accepted<Self::Connection, Self::Frames>, AcceptError>;
}
