use huddle_client::{MemoryStore, PeerLinkState, SinkEvent};
use serde_json::Value;

use crate::integration::{ROOM, init_tracing};
use crate::utils::{RemotePeer, TestParticipant, WAIT_TIMEOUT_MS, wait_until};

#[tokio::test]
async fn test_shutdown_closes_all_links() {
    init_tracing();

    let store = MemoryStore::new();
    let lower = RemotePeer::join(&store, ROOM, "100").await;
    let higher = RemotePeer::join(&store, ROOM, "400").await;
    let mut local = TestParticipant::join(&store, ROOM, "300")
        .await
        .expect("Failed to join");

    assert!(
        local
            .wait_for_link(&lower.id, PeerLinkState::AwaitingAnswer)
            .await
    );
    assert!(
        local
            .wait_for_link(&higher.id, PeerLinkState::AwaitingOffer)
            .await
    );
    let sessions = local.transports.sessions().await;
    assert_eq!(sessions.len(), 2);

    local.handle.shutdown().await.expect("Failed to shut down");

    for session in &sessions {
        assert!(session.is_closed().await, "{} left open", session.remote);
    }
    let released = local
        .drain_sink_events()
        .into_iter()
        .filter(|e| matches!(e, SinkEvent::Released(_)))
        .count();
    assert_eq!(released, 2);
    assert!(local.handle.snapshot().await.is_err(), "room task has ended");

    assert_eq!(local.session.watch_count(), 0);
    assert_eq!(store.watch_count(), 0);

    // Shutdown is not a leave: the record goes only when the connection drops.
    let member = format!("room/{ROOM}/members/300");
    assert!(!store.read(&member).unwrap().is_null());
    local.session.disconnect();
    assert_eq!(store.read(&member).unwrap(), Value::Null);
}

#[tokio::test]
async fn test_dropped_handle_stops_watching() {
    init_tracing();

    let store = MemoryStore::new();
    let local = TestParticipant::join(&store, ROOM, "300")
        .await
        .expect("Failed to join");
    assert_eq!(local.session.watch_count(), 1);

    let session = local.session.clone();
    drop(local);

    let unwatched = wait_until(WAIT_TIMEOUT_MS, || {
        let session = session.clone();
        async move { session.watch_count() == 0 }
    })
    .await;
    assert!(unwatched, "member watch should be cancelled");
}
