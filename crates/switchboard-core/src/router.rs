//! Targeted and broadcast delivery over registry snapshots.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::ids::{ConnectionId, PeerId};
use crate::metrics::{RELAY_DELIVERIES_TOTAL, RELAY_DELIVERY_FAILURES_TOTAL};
use crate::payload::Payload;
use crate::registry::ConnectionRegistry;
use crate::transport::Connection;

/// Per-call delivery tally. Informational only: failures never surface as
/// errors to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections the payload was written to.
    pub attempted: usize,
    /// Writes that succeeded.
    pub delivered: usize,
    /// Writes that failed.
    pub failed: usize,
}

/// Delivers payloads to the connections the registry knows about.
///
/// Every call takes a snapshot first, so registrations made while a delivery
/// is in flight are not reached by it.
#[derive(Clone)]
pub struct DeliveryRouter {
    registry: Arc<ConnectionRegistry>,
}

impl DeliveryRouter {
    /// Create a router over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this router reads from.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Write `payload` to every connection of `peer`, in registration order.
    /// An unknown peer is a silent no-op.
    pub async fn send_to_peer(&self, peer: &PeerId, payload: &Payload) -> DeliveryReport {
        let targets = self.registry.connections_for(peer);
        debug!(peer_id = %peer, recipients = targets.len(), "send to peer");
        deliver(&targets, payload).await
    }

    /// Write `payload` to every registered connection.
    pub async fn broadcast(&self, payload: &Payload) -> DeliveryReport {
        let targets = self.registry.all_connections();
        debug!(recipients = targets.len(), "broadcast");
        deliver(&targets, payload).await
    }

    /// Write `payload` to every registered connection except `exclude`.
    pub async fn broadcast_except(&self, exclude: &ConnectionId, payload: &Payload) -> DeliveryReport {
        let targets: Vec<_> = self
            .registry
            .all_connections()
            .into_iter()
            .filter(|c| c.id() != exclude)
            .collect();
        debug!(recipients = targets.len(), exclude = %exclude, "broadcast except sender");
        deliver(&targets, payload).await
    }
}

async fn deliver(targets: &[Arc<dyn Connection>], payload: &Payload) -> DeliveryReport {
    let mut report = DeliveryReport {
        attempted: targets.len(),
        ..DeliveryReport::default()
    };
    for conn in targets {
        match conn.send(payload.clone()).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                warn!(conn_id = %conn.id(), error = %e, "failed to deliver to connection");
            }
        }
    }
    counter!(RELAY_DELIVERIES_TOTAL).increment(report.delivered as u64);
    if report.failed > 0 {
        counter!(RELAY_DELIVERY_FAILURES_TOTAL).increment(report.failed as u64);
    }
    report
}
