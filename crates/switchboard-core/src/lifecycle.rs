//! Session lifecycle: one accepted connection from handshake to cleanup.
//!
//! ```text
//! Connecting ──accept ok──▶ Open ──close / read error / cancel──▶ Closed
//!     └────────accept error──────────────────────────────────────▶ Closed
//! ```
//!
//! A connection is registered only once it is `Open`, and is always
//! deregistered before the presence broadcast for its peer goes out.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::{AcceptError, ReadError};
use crate::ids::{ConnectionId, PeerId};
use crate::metrics::{
    PRESENCE_DEPARTURES_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::payload::Payload;
use crate::policy::{RelayPolicy, SessionPolicy, addressed_target, presence_left_message};
use crate::registry::ConnectionRegistry;
use crate::router::{DeliveryReport, DeliveryRouter};
use crate::transport::{Accepted, Connection, FrameSource, Transport};

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Transport handshake in progress; nothing registered.
    Connecting,
    /// Registered and relaying frames.
    Open,
    /// Deregistered. Terminal.
    Closed,
}

/// Why the receive loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer (or the local side) closed the connection cleanly.
    PeerClosed,
    /// Reading the next frame failed.
    ReadFailed(ReadError),
    /// The session's cancellation token fired.
    Cancelled,
}

/// What happened during one completed session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// The connection this session owned.
    pub connection_id: ConnectionId,
    /// Why it ended.
    pub end: SessionEnd,
    /// Inbound frames relayed.
    pub frames_received: u64,
    /// Whether this session broadcast the peer's departure.
    pub announced_departure: bool,
}

/// Drives sessions against a shared registry.
#[derive(Clone)]
pub struct SessionController {
    registry: Arc<ConnectionRegistry>,
    router: DeliveryRouter,
    policy: SessionPolicy,
}

impl SessionController {
    /// Create a controller that registers into `registry` and relays per
    /// `policy`.
    pub fn new(registry: Arc<ConnectionRegistry>, policy: SessionPolicy) -> Self {
        let router = DeliveryRouter::new(Arc::clone(&registry));
        Self {
            registry,
            router,
            policy,
        }
    }

    /// The same registry with a different policy.
    #[must_use]
    pub fn with_policy(&self, policy: SessionPolicy) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            router: self.router.clone(),
            policy,
        }
    }

    /// The policy sessions run under.
    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// The router sessions deliver through.
    pub fn router(&self) -> &DeliveryRouter {
        &self.router
    }

    /// Run one session to completion.
    pub async fn run<T: Transport>(
        &self,
        peer: PeerId,
        transport: T,
        cancel: CancellationToken,
    ) -> Result<SessionSummary, AcceptError> {
        let (state, _) = watch::channel(SessionState::Connecting);
        self.run_observed(peer, transport, cancel, state).await
    }

    /// Run one session to completion, publishing every state change on
    /// `state`.
    #[instrument(skip_all, fields(peer_id = %peer))]
    pub async fn run_observed<T: Transport>(
        &self,
        peer: PeerId,
        transport: T,
        cancel: CancellationToken,
        state: watch::Sender<SessionState>,
    ) -> Result<SessionSummary, AcceptError> {
        let _ = state.send_replace(SessionState::Connecting);

        let Accepted { connection, mut frames } = match transport.accept(&peer).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                let _ = state.send_replace(SessionState::Closed);
                return Err(e);
            }
        };
        let conn_id = connection.id().clone();
        let connection: Arc<dyn Connection> = connection;

        let _ = self.registry.register(&peer, Arc::clone(&connection));
        let _ = state.send_replace(SessionState::Open);

        let started = Instant::now();
        info!(conn_id = %conn_id, "connection opened");
        counter!(WS_CONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

        let mut frames_received = 0_u64;
        let end = loop {
            let next = tokio::select! {
                () = cancel.cancelled() => break SessionEnd::Cancelled,
                next = frames.receive() => next,
            };
            match next {
                Ok(Some(payload)) => {
                    frames_received += 1;
                    let report = self.relay(&peer, &conn_id, &payload).await;
                    debug!(
                        conn_id = %conn_id,
                        len = payload.len(),
                        delivered = report.delivered,
                        failed = report.failed,
                        "frame relayed"
                    );
                }
                Ok(None) => break SessionEnd::PeerClosed,
                Err(e) => break SessionEnd::ReadFailed(e),
            }
        };

        match &end {
            SessionEnd::PeerClosed => info!(conn_id = %conn_id, "connection closed"),
            SessionEnd::Cancelled => info!(conn_id = %conn_id, "session cancelled"),
            SessionEnd::ReadFailed(e) => warn!(conn_id = %conn_id, error = %e, "connection read failed"),
        }

        connection.close().await;
        let departure = self.registry.deregister(&peer, &conn_id);
        let _ = state.send_replace(SessionState::Closed);

        counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let announced_departure = departure.peer_emptied() && self.policy.announce_departures;
        if departure.peer_emptied() {
            counter!(PRESENCE_DEPARTURES_TOTAL).increment(1);
            info!(conn_id = %conn_id, "peer has no connections left");
        }
        if announced_departure {
            let notice = Payload::text(presence_left_message(&peer));
            let _ = self.router.broadcast(&notice).await;
        }

        Ok(SessionSummary {
            connection_id: conn_id,
            end,
            frames_received,
            announced_departure,
        })
    }

    async fn relay(&self, peer: &PeerId, conn_id: &ConnectionId, payload: &Payload) -> DeliveryReport {
        match self.policy.relay {
            RelayPolicy::EchoToPeer => self.router.send_to_peer(peer, payload).await,
            RelayPolicy::Broadcast => self.router.broadcast(payload).await,
            RelayPolicy::Addressed => match addressed_target(payload) {
                Some(target) => self.router.send_to_peer(&target, payload).await,
                None => self.router.broadcast_except(conn_id, payload).await,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{self, MemoryPeer};
    use assert_matches::assert_matches;
    use tokio::task::JoinHandle;

    type Session = JoinHandle<Result<SessionSummary, AcceptError>>;

    fn controller(policy: SessionPolicy) -> SessionController {
        SessionController::new(Arc::new(ConnectionRegistry::new()), policy)
    }

    /// Spawn a session and wait until it is registered.
    async fn open(ctl: &SessionController, peer: &str) -> (Session, MemoryPeer, CancellationToken) {
        let (transport, remote) = memory::pair();
        let (state_tx, mut state_rx) = watch::channel(SessionState::Connecting);
        let cancel = CancellationToken::new();
        let task = {
            let ctl = ctl.clone();
            let peer = PeerId::from(peer);
            let cancel = cancel.clone();
            tokio::spawn(async move { ctl.run_observed(peer, transport, cancel, state_tx).await })
        };
        let _ = state_rx
            .wait_for(|s| *s == SessionState::Open)
            .await
            .unwrap();
        (task, remote, cancel)
    }

    #[tokio::test]
    async fn accept_failure_registers_nothing() {
        let ctl = controller(SessionPolicy::chat());
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let result = ctl
            .run_observed(
                PeerId::from("42"),
                memory::MemoryTransport::rejecting("nope"),
                CancellationToken::new(),
                state_tx,
            )
            .await;
        assert_matches!(result, Err(AcceptError::Rejected(_)));
        assert_eq!(*state_rx.borrow(), SessionState::Closed);
        assert_eq!(ctl.registry.peer_count(), 0);
    }

    #[tokio::test]
    async fn echo_reaches_every_connection_of_the_peer() {
        let ctl = controller(SessionPolicy::chat());
        let (_s1, mut a, _) = open(&ctl, "42").await;
        let (_s2, mut b, _) = open(&ctl, "42").await;
        let (_s3, mut other, _) = open(&ctl, "7").await;

        a.send_text("hello");
        assert_eq!(a.recv().await, Some(Payload::text("hello")));
        assert_eq!(b.recv().await, Some(Payload::text("hello")));
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn last_close_announces_once() {
        let ctl = controller(SessionPolicy::chat());
        let (s1, mut a, _) = open(&ctl, "42").await;
        let (s2, mut b, _) = open(&ctl, "42").await;
        let (_s3, mut watcher, _) = open(&ctl, "7").await;

        a.disconnect();
        let first = s1.await.unwrap().unwrap();
        assert_eq!(first.end, SessionEnd::PeerClosed);
        assert!(!first.announced_departure);
        assert!(ctl.registry.is_online(&PeerId::from("42")));
        assert!(watcher.try_recv().is_none());

        b.disconnect();
        let second = s2.await.unwrap().unwrap();
        assert!(second.announced_departure);
        assert!(!ctl.registry.is_online(&PeerId::from("42")));
        assert_eq!(watcher.recv().await, Some(Payload::text("User 42 left the chat")));
        assert!(watcher.try_recv().is_none());
    }

    #[tokio::test]
    async fn read_error_cleans_up_like_close() {
        let ctl = controller(SessionPolicy::chat());
        let (s1, a, _) = open(&ctl, "42").await;
        let (_s2, mut watcher, _) = open(&ctl, "7").await;

        a.fail_read(ReadError::Transport("reset".into()));
        let summary = s1.await.unwrap().unwrap();
        assert_matches!(summary.end, SessionEnd::ReadFailed(ReadError::Transport(_)));
        assert!(summary.announced_departure);
        assert!(a.is_closed());
        assert_eq!(watcher.recv().await, Some(Payload::text("User 42 left the chat")));
    }

    #[tokio::test]
    async fn cancellation_ends_session_and_closes_transport() {
        let ctl = controller(SessionPolicy::chat());
        let (s1, a, cancel) = open(&ctl, "42").await;
        cancel.cancel();
        let summary = s1.await.unwrap().unwrap();
        assert_eq!(summary.end, SessionEnd::Cancelled);
        assert!(a.is_closed());
        assert_eq!(ctl.registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn silent_departure_when_not_announcing() {
        let ctl = controller(SessionPolicy::signaling(false));
        let (s1, mut a, _) = open(&ctl, "alice").await;
        let (_s2, mut bob, _) = open(&ctl, "bob").await;
        a.disconnect();
        let summary = s1.await.unwrap().unwrap();
        assert!(!summary.announced_departure);
        assert!(bob.try_recv().is_none());
    }

    #[tokio::test]
    async fn addressed_frame_goes_to_target_unchanged() {
        let ctl = controller(SessionPolicy::signaling(false));
        let (_s1, alice, _) = open(&ctl, "alice").await;
        let (_s2, mut bob, _) = open(&ctl, "bob").await;
        let (_s3, mut carol, _) = open(&ctl, "carol").await;

        let offer = r#"{"to":"bob","type":"offer","sdp":"v=0\r\n"}"#;
        alice.send_text(offer);
        assert_eq!(bob.recv().await, Some(Payload::text(offer)));
        assert!(carol.try_recv().is_none());
    }

    #[tokio::test]
    async fn untargeted_frame_goes_to_everyone_else() {
        let ctl = controller(SessionPolicy::signaling(false));
        let (_s1, mut alice, _) = open(&ctl, "alice").await;
        let (_s2, mut bob, _) = open(&ctl, "bob").await;

        alice.send_text("ready");
        assert_eq!(bob.recv().await, Some(Payload::text("ready")));
        assert!(alice.try_recv().is_none());
    }

    #[tokio::test]
    async fn broadcast_policy_reaches_sender_too() {
        let ctl = controller(SessionPolicy {
            relay: RelayPolicy::Broadcast,
            announce_departures: false,
        });
        let (_s1, mut a, _) = open(&ctl, "1").await;
        let (_s2, mut b, _) = open(&ctl, "2").await;
        a.send_text("all");
        assert_eq!(a.recv().await, Some(Payload::text("all")));
        assert_eq!(b.recv().await, Some(Payload::text("all")));
    }

    #[tokio::test]
    async fn frames_are_counted() {
        let ctl = controller(SessionPolicy::chat());
        let (s1, mut a, _) = open(&ctl, "1").await;
        a.send_text("one");
        a.send_text("two");
        a.disconnect();
        assert_eq!(s1.await.unwrap().unwrap().frames_received, 2);
    }
}
