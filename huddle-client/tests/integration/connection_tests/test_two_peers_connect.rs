use huddle_client::{MemoryStore, PeerLinkState, SinkEvent};
use huddle_core::{PairKey, RoomPaths, SdpKind};
use serde_json::Value;

use crate::integration::{ROOM, init_tracing};
use crate::utils::{TestParticipant, WAIT_TIMEOUT_MS, wait_until};

#[tokio::test]
async fn test_two_peers_connect() {
    init_tracing();

    let store = MemoryStore::new();
    let mut alice = TestParticipant::join(&store, ROOM, "100")
        .await
        .expect("Failed to join 100");
    let mut bob = TestParticipant::join(&store, ROOM, "200")
        .await
        .expect("Failed to join 200");

    assert!(
        bob.wait_for_link(&alice.id, PeerLinkState::Connected).await,
        "200 should connect to 100"
    );
    assert!(
        alice.wait_for_link(&bob.id, PeerLinkState::Connected).await,
        "100 should connect to 200"
    );

    // 200 is greater, so it offered and 100 answered.
    let offerer = bob.transports.latest_for(&alice.id).await.unwrap();
    let answerer = alice.transports.latest_for(&bob.id).await.unwrap();
    let applied_offer = answerer.remote_descriptions().await;
    let applied_answer = offerer.remote_descriptions().await;
    assert_eq!(applied_offer.len(), 1);
    assert_eq!(applied_offer[0].kind, SdpKind::Offer);
    assert_eq!(applied_answer.len(), 1);
    assert_eq!(applied_answer[0].kind, SdpKind::Answer);

    // Both descriptions were consumed off the shared paths.
    let paths = RoomPaths::new(ROOM);
    let pair = PairKey::new(&alice.id, &bob.id).unwrap();
    assert_eq!(store.read(&paths.offer(&pair)).unwrap(), Value::Null);
    assert_eq!(store.read(&paths.answer(&pair)).unwrap(), Value::Null);

    assert!(matches!(
        alice.drain_sink_events().as_slice(),
        [SinkEvent::Created(id)] if *id == bob.id
    ));
    assert!(matches!(
        bob.drain_sink_events().as_slice(),
        [SinkEvent::Created(id)] if *id == alice.id
    ));

    // Local candidates travel through the store to the other side.
    offerer.emit_candidate("candidate:1 1 udp 1 10.0.0.2 5000 typ host").await;
    answerer.emit_candidate("candidate:2 1 udp 1 10.0.0.1 5001 typ host").await;

    let delivered = wait_until(WAIT_TIMEOUT_MS, || {
        let answerer = answerer.clone();
        let offerer = offerer.clone();
        async move {
            answerer.candidates().await.len() == 1 && offerer.candidates().await.len() == 1
        }
    })
    .await;
    assert!(delivered, "candidates should reach both sessions");
    assert_eq!(
        answerer.candidates().await,
        vec!["candidate:1 1 udp 1 10.0.0.2 5000 typ host"]
    );

    // Inbound media is routed to the sink of the right peer.
    answerer.emit_inbound("bob-mic").await;
    let attached = wait_until(WAIT_TIMEOUT_MS, || {
        let events = alice.drain_sink_events();
        async move {
            events
                .iter()
                .any(|e| matches!(e, SinkEvent::Attached(_, s) if s.stream_id() == "bob-mic"))
        }
    })
    .await;
    assert!(attached, "inbound stream should attach to the sink");

    alice.handle.leave().await.expect("Failed to leave");
    bob.handle.leave().await.expect("Failed to leave");
}
