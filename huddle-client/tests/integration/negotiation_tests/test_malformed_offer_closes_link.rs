use huddle_client::{MemoryStore, PeerLinkState, SinkEvent};
use serde_json::{Value, json};

use crate::integration::{ROOM, init_tracing};
use crate::utils::{RemotePeer, TestParticipant, WAIT_TIMEOUT_MS, wait_until};

#[tokio::test]
async fn test_malformed_offer_closes_link() {
    init_tracing();

    let store = MemoryStore::new();
    let remote = RemotePeer::join(&store, ROOM, "200").await;
    let mut local = TestParticipant::join(&store, ROOM, "100")
        .await
        .expect("Failed to join");
    assert!(
        local
            .wait_for_link(&remote.id, PeerLinkState::AwaitingOffer)
            .await
    );

    // Well-formed envelope, unparsable SDP.
    remote.offer_to(&local.id, "garbage").await;
    assert!(local.wait_for_no_link(&remote.id).await);

    let first = local.transports.latest_for(&remote.id).await.unwrap();
    assert!(first.is_closed().await);
    let pair = remote.pair_with(&local.id);
    assert_eq!(store.read(&remote.paths().offer(&pair)).unwrap(), Value::Null);

    let events = local.drain_sink_events();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, SinkEvent::Released(id) if *id == remote.id))
            .count(),
        1
    );

    // Any membership change recreates the link under a new epoch.
    remote.set_flag("speaking", true).await;
    assert!(
        local
            .wait_for_link(&remote.id, PeerLinkState::AwaitingOffer)
            .await
    );
    let second = local.transports.latest_for(&remote.id).await.unwrap();
    assert!(second.epoch > first.epoch);

    remote.offer_to(&local.id, "v=0 retry").await;
    assert!(
        local
            .wait_for_link(&remote.id, PeerLinkState::Connected)
            .await
    );
    assert!(first.remote_descriptions().await.is_empty());
    assert_eq!(second.remote_descriptions().await.len(), 1);

    local.handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_undecodable_offer_closes_only_that_link() {
    init_tracing();

    let store = MemoryStore::new();
    let broken = RemotePeer::join(&store, ROOM, "200").await;
    let healthy = RemotePeer::join(&store, ROOM, "300").await;
    let local = TestParticipant::join(&store, ROOM, "100")
        .await
        .expect("Failed to join");

    for remote in [&broken, &healthy] {
        assert!(
            local
                .wait_for_link(&remote.id, PeerLinkState::AwaitingOffer)
                .await
        );
    }

    let pair = broken.pair_with(&local.id);
    broken
        .write_raw(&broken.paths().offer(&pair), json!({ "kind": "offer", "sdp": 7 }))
        .await;
    assert!(local.wait_for_no_link(&broken.id).await);

    healthy.offer_to(&local.id, "v=0 healthy").await;
    assert!(
        local
            .wait_for_link(&healthy.id, PeerLinkState::Connected)
            .await
    );

    let closed = wait_until(WAIT_TIMEOUT_MS, || {
        let transports = local.transports.clone();
        let id = broken.id.clone();
        async move {
            match transports.latest_for(&id).await {
                Some(session) => session.is_closed().await,
                None => false,
            }
        }
    })
    .await;
    assert!(closed);

    local.handle.leave().await.unwrap();
}
