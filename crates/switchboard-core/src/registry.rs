//! Peer → live connections mapping.
//!
//! One mutex guards the whole mapping. It is only ever held for in-memory
//! bookkeeping, never across an `.await`, so readers see either the state
//! before a mutation or the state after it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::ids::{ConnectionId, PeerId};
use crate::transport::Connection;

/// Outcome of [`ConnectionRegistry::register`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Registration {
    /// The connection was added to the peer's set.
    Added,
    /// The connection was already registered for this peer; nothing changed.
    AlreadyRegistered,
    /// The connection was registered under another peer and has been moved.
    Moved {
        /// Peer that previously held the connection.
        previous: PeerId,
    },
}

/// Outcome of [`ConnectionRegistry::deregister`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Departure {
    /// Whether the connection was present and has been removed.
    pub removed: bool,
    /// Connections the peer still has after this call.
    pub remaining: usize,
}

impl Departure {
    /// True only for the call that removed the peer's last connection.
    pub fn peer_emptied(&self) -> bool {
        self.removed && self.remaining == 0
    }
}

#[derive(Default)]
struct RegistryState {
    /// Insertion-ordered connection sets. A key exists iff its set is non-empty.
    peers: HashMap<PeerId, Vec<Arc<dyn Connection>>>,
    /// Reverse index: which peer holds each connection.
    owners: HashMap<ConnectionId, PeerId>,
}

impl RegistryState {
    /// Remove `conn_id` from `peer`'s set, dropping the key if it empties.
    /// Returns `(removed, remaining)`.
    fn detach(&mut self, peer: &PeerId, conn_id: &ConnectionId) -> (bool, usize) {
        let Some(conns) = self.peers.get_mut(peer) else {
            return (false, 0);
        };
        let before = conns.len();
        conns.retain(|c| c.id() != conn_id);
        let removed = conns.len() != before;
        let remaining = conns.len();
        if remaining == 0 {
            let _ = self.peers.remove(peer);
        }
        if removed {
            let _ = self.owners.remove(conn_id);
        }
        (removed, remaining)
    }
}

/// Tracks every open connection per peer.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` to `peer`'s set, creating the entry if absent.
    ///
    /// Membership is idempotent. A connection held by another peer is moved,
    /// so a connection never appears under two peers.
    pub fn register(&self, peer: &PeerId, connection: Arc<dyn Connection>) -> Registration {
        let conn_id = connection.id().clone();
        let mut state = self.state.lock();

        let outcome = match state.owners.get(&conn_id).cloned() {
            Some(owner) if &owner == peer => return Registration::AlreadyRegistered,
            Some(owner) => {
                let _ = state.detach(&owner, &conn_id);
                Registration::Moved { previous: owner }
            }
            None => Registration::Added,
        };

        state.peers.entry(peer.clone()).or_default().push(connection);
        let _ = state.owners.insert(conn_id.clone(), peer.clone());
        let count = state.peers.get(peer).map_or(0, Vec::len);
        drop(state);

        if let Registration::Moved { previous } = &outcome {
            warn!(peer_id = %peer, conn_id = %conn_id, previous = %previous, "connection moved between peers");
        }
        debug!(peer_id = %peer, conn_id = %conn_id, connections = count, "connection registered");
        outcome
    }

    /// Remove `conn_id` from `peer`'s set. Removing the last connection
    /// removes the peer. Unknown connections are a no-op.
    pub fn deregister(&self, peer: &PeerId, conn_id: &ConnectionId) -> Departure {
        let (removed, remaining) = self.state.lock().detach(peer, conn_id);
        if removed {
            debug!(peer_id = %peer, conn_id = %conn_id, remaining, "connection deregistered");
        }
        Departure { removed, remaining }
    }

    /// Snapshot of `peer`'s connections in registration order. Empty if the
    /// peer is unknown.
    pub fn connections_for(&self, peer: &PeerId) -> Vec<Arc<dyn Connection>> {
        self.state
            .lock()
            .peers
            .get(peer)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every connection across every peer.
    pub fn all_connections(&self) -> Vec<Arc<dyn Connection>> {
        self.state
            .lock()
            .peers
            .values()
            .flat_map(|conns| conns.iter().cloned())
            .collect()
    }

    /// Whether `peer` has at least one open connection.
    pub fn is_online(&self, peer: &PeerId) -> bool {
        self.state.lock().peers.contains_key(peer)
    }

    /// Peers with at least one open connection.
    pub fn peers(&self) -> Vec<PeerId> {
        self.state.lock().peers.keys().cloned().collect()
    }

    /// Number of peers with at least one open connection.
    pub fn peer_count(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Total open connections across all peers.
    pub fn connection_count(&self) -> usize {
        self.state.lock().owners.len()
    }
}
