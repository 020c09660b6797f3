//! Transport error taxonomy.
//!
//! Every variant here has a blast radius of one connection:
//!
//! - [`AcceptError`]: the session never starts, nothing was registered
//! - [`ReadError`]: the session ends and goes through normal cleanup
//! - [`WriteError`]: one delivery failed, the router moves on to the next
//!   connection

use thiserror::Error;

/// Transport-level accept handshake failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcceptError {
    /// The upgrade/handshake itself failed.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// The transport refused the peer before opening.
    #[error("connection rejected: {0}")]
    Rejected(String),
}

/// Receiving the next inbound frame failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    /// Underlying socket error.
    #[error("transport read failed: {0}")]
    Transport(String),
    /// The peer stopped answering pings.
    #[error("heartbeat timed out")]
    HeartbeatTimeout,
}

/// Writing a frame to one connection failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    /// The connection is already closed.
    #[error("connection closed")]
    Closed,
    /// The connection's outbound queue is full.
    #[error("outbound queue full")]
    QueueFull,
    /// Underlying socket error.
    #[error("transport write failed: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_error_display() {
        let err = AcceptError::Handshake("bad upgrade header".into());
        assert_eq!(err.to_string(), "handshake failed: bad upgrade header");
    }

    #[test]
    fn read_error_display() {
        assert_eq!(ReadError::HeartbeatTimeout.to_string(), "heartbeat timed out");
        assert!(
            ReadError::Transport("reset by peer".into())
                .to_string()
                .contains("reset by peer")
        );
    }

    #[test]
    fn write_error_display() {
        assert_eq!(WriteError::Closed.to_string(), "connection closed");
        assert_eq!(WriteError::QueueFull.to_string(), "outbound queue full");
    }
}
