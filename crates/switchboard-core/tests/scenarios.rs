//! End-to-end relay scenarios over the in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use switchboard_core::memory::{self, MemoryPeer};
use switchboard_core::{
    AcceptError, Connection, ConnectionRegistry, DeliveryRouter, Payload, PeerId, ReadError, SessionController,
    SessionEnd, SessionPolicy, SessionState, SessionSummary,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Client {
    task: JoinHandle<Result<SessionSummary, AcceptError>>,
    remote: MemoryPeer,
}

impl Client {
    async fn connect(ctl: &SessionController, peer: &str, cancel: &CancellationToken) -> Self {
        let (transport, remote) = memory::pair();
        let (state_tx, mut state_rx) = watch::channel(SessionState::Connecting);
        let task = {
            let ctl = ctl.clone();
            let peer = PeerId::from(peer);
            let cancel = cancel.child_token();
            tokio::spawn(async move { ctl.run_observed(peer, transport, cancel, state_tx).await })
        };
        let _ = tokio::time::timeout(TIMEOUT, state_rx.wait_for(|s| *s == SessionState::Open))
            .await
            .expect("session should open")
            .expect("state channel open");
        Self { task, remote }
    }

    async fn finish(&mut self) -> SessionSummary {
        tokio::time::timeout(TIMEOUT, &mut self.task)
            .await
            .expect("session should end")
            .expect("session task panicked")
            .expect("accept succeeded")
    }

    async fn next_text(&mut self) -> String {
        let payload = tokio::time::timeout(TIMEOUT, self.remote.recv())
            .await
            .expect("frame should arrive")
            .expect("connection open");
        payload.as_text().expect("text frame").to_owned()
    }
}

fn setup(policy: SessionPolicy) -> (Arc<ConnectionRegistry>, SessionController) {
    let registry = Arc::new(ConnectionRegistry::new());
    let ctl = SessionController::new(Arc::clone(&registry), policy);
    (registry, ctl)
}

#[tokio::test]
async fn peer_with_two_connections_leaves_once() {
    let (registry, ctl) = setup(SessionPolicy::chat());
    let cancel = CancellationToken::new();
    let peer42 = PeerId::from(42_i64);

    let mut a = Client::connect(&ctl, "42", &cancel).await;
    let mut b = Client::connect(&ctl, "42", &cancel).await;
    let mut observer = Client::connect(&ctl, "9", &cancel).await;
    assert_eq!(registry.connections_for(&peer42).len(), 2);

    // A message from A reaches both A and B.
    a.remote.send_text("hi from A");
    assert_eq!(a.next_text().await, "hi from A");
    assert_eq!(b.next_text().await, "hi from A");

    // A closes: 42 stays with just B, nobody is told.
    a.remote.disconnect();
    let a_summary = a.finish().await;
    assert_eq!(a_summary.end, SessionEnd::PeerClosed);
    assert!(!a_summary.announced_departure);
    let left: Vec<_> = registry
        .connections_for(&peer42)
        .iter()
        .map(|c| c.id().clone())
        .collect();
    assert_eq!(left, vec![b.remote.connection_id().clone()]);

    // B closes: 42 disappears and exactly one presence message goes out.
    b.remote.disconnect();
    let b_summary = b.finish().await;
    assert!(b_summary.announced_departure);
    assert!(!registry.is_online(&peer42));
    assert_eq!(observer.next_text().await, "User 42 left the chat");
    assert!(observer.remote.try_recv().is_none());
}

#[tokio::test]
async fn departure_notice_follows_deregistration() {
    let (registry, ctl) = setup(SessionPolicy::chat());
    let cancel = CancellationToken::new();
    let mut a = Client::connect(&ctl, "42", &cancel).await;
    let mut b = Client::connect(&ctl, "7", &cancel).await;

    a.remote.disconnect();
    let _ = a.finish().await;

    // The leaver's own connection is gone before the notice is sent.
    assert!(a.remote.try_recv().is_none());
    assert_eq!(b.next_text().await, "User 42 left the chat");
    assert_eq!(registry.peer_count(), 1);
}

#[tokio::test]
async fn send_to_peer_without_connections_is_noop() {
    let (registry, _ctl) = setup(SessionPolicy::chat());
    let router = DeliveryRouter::new(Arc::clone(&registry));
    let report = router.send_to_peer(&PeerId::from(7_i64), &Payload::text("anyone?")).await;
    assert_eq!(report.attempted, 0);
    assert_eq!(registry.peer_count(), 0);
}

#[tokio::test]
async fn read_failure_and_close_clean_up_the_same_way() {
    let (registry, ctl) = setup(SessionPolicy::chat());
    let cancel = CancellationToken::new();
    let mut failing = Client::connect(&ctl, "1", &cancel).await;
    let mut closing = Client::connect(&ctl, "2", &cancel).await;
    let mut observer = Client::connect(&ctl, "3", &cancel).await;

    failing.remote.fail_read(ReadError::Transport("connection reset".into()));
    let failed = failing.finish().await;
    closing.remote.disconnect();
    let closed = closing.finish().await;

    assert!(matches!(failed.end, SessionEnd::ReadFailed(ReadError::Transport(_))));
    assert_eq!(closed.end, SessionEnd::PeerClosed);
    assert!(failed.announced_departure && closed.announced_departure);
    assert_eq!(registry.peer_count(), 1);
    assert_eq!(observer.next_text().await, "User 1 left the chat");
    assert_eq!(observer.next_text().await, "User 2 left the chat");
}

#[tokio::test]
async fn rejected_accept_never_registers() {
    let (registry, ctl) = setup(SessionPolicy::chat());
    let err = ctl
        .run(
            PeerId::from("42"),
            memory::MemoryTransport::rejecting("handshake refused"),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err, AcceptError::Rejected("handshake refused".into()));
    assert_eq!(registry.connection_count(), 0);
}

#[tokio::test]
async fn shutdown_cancels_every_session() {
    let (registry, ctl) = setup(SessionPolicy::chat());
    let cancel = CancellationToken::new();
    let clients = vec![
        Client::connect(&ctl, "1", &cancel).await,
        Client::connect(&ctl, "1", &cancel).await,
        Client::connect(&ctl, "2", &cancel).await,
    ];
    assert_eq!(registry.connection_count(), 3);

    cancel.cancel();
    for mut client in clients {
        let summary = client.finish().await;
        assert_eq!(summary.end, SessionEnd::Cancelled);
    }
    assert_eq!(registry.connection_count(), 0);
    assert_eq!(registry.peer_count(), 0);
}

#[tokio::test]
async fn signaling_routes_offer_and_answer() {
    let (_registry, ctl) = setup(SessionPolicy::signaling(false));
    let cancel = CancellationToken::new();
    let mut alice = Client::connect(&ctl, "alice", &cancel).await;
    let mut bob = Client::connect(&ctl, "bob", &cancel).await;

    let offer = r#"{"type":"offer","to":"bob","from":"alice","sdp":"v=0"}"#;
    alice.remote.send_text(offer);
    assert_eq!(bob.next_text().await, offer);

    let answer = r#"{"type":"answer","to":"alice","sdp":"v=0"}"#;
    bob.remote.send_text(answer);
    assert_eq!(alice.next_text().await, answer);

    // Addressed to nobody connected: dropped silently.
    alice.remote.send_text(r#"{"type":"candidate","to":"carol"}"#);
    alice.remote.disconnect();
    let summary = alice.finish().await;
    assert_eq!(summary.frames_received, 2);
    assert!(!summary.announced_departure);
    assert!(bob.remote.try_recv().is_none());
}
