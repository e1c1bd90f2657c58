use huddle_client::{MemoryStore, PeerLinkState};
use huddle_core::SdpKind;
use serde_json::Value;

use crate::integration::{ROOM, init_tracing};
use crate::utils::{RemotePeer, SessionCall, TestParticipant, settle};

#[tokio::test]
async fn test_replayed_offer_applied_once() {
    init_tracing();

    let store = MemoryStore::new();
    let remote = RemotePeer::join(&store, ROOM, "200").await;
    let local = TestParticipant::join(&store, ROOM, "100")
        .await
        .expect("Failed to join");

    remote.offer_to(&local.id, "v=0 remote-offer").await;
    assert!(
        local
            .wait_for_link(&remote.id, PeerLinkState::Connected)
            .await
    );

    let pair = remote.pair_with(&local.id);
    assert_eq!(
        store.read(&remote.paths().offer(&pair)).unwrap(),
        Value::Null,
        "answerer deletes the offer it consumed"
    );
    let answer = store.read(&remote.paths().answer(&pair)).unwrap();
    assert_eq!(answer["kind"], "answer");
    assert_eq!(answer["route"]["from"], "100");
    assert_eq!(answer["route"]["to"], "200");

    // The same offer shows up again, then every watch is re-delivered.
    remote.offer_to(&local.id, "v=0 remote-offer").await;
    store.replay();
    settle().await;

    let session = local.transports.latest_for(&remote.id).await.unwrap();
    let remotes = session.remote_descriptions().await;
    assert_eq!(remotes.len(), 1);
    assert_eq!(remotes[0].kind, SdpKind::Offer);
    assert_eq!(
        session
            .calls()
            .await
            .iter()
            .filter(|c| **c == SessionCall::CreateAnswer)
            .count(),
        1
    );
    assert_eq!(
        local.link_state(&remote.id).await,
        Some(PeerLinkState::Connected)
    );

    local.handle.leave().await.unwrap();
}
