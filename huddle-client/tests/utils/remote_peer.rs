use huddle_client::{DisconnectOp, MemorySession, MemoryStore, SharedStore};
use huddle_core::{
    IceCandidate, PairKey, PeerIdentity, Route, RoomPaths, SessionDescription, SignalEnvelope,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// A participant driven by hand: writes presence and signaling entries
/// straight into the store, the way another client would.
pub struct RemotePeer {
    pub id: PeerIdentity,
    session: Arc<MemorySession>,
    paths: RoomPaths,
}

impl RemotePeer {
    pub async fn join(store: &MemoryStore, room_id: &str, id: &str) -> Self {
        let peer = Self::detached(store, room_id, id);
        let path = peer.paths.member(&peer.id);
        peer.session
            .write(&path, json!({ "speaking": false, "muted": false }))
            .await
            .expect("Failed to write presence");
        peer.session
            .on_disconnect(&path, DisconnectOp::Delete)
            .await
            .expect("Failed to arm disconnect hook");
        peer
    }

    /// Connected to the store but absent from the member map.
    pub fn detached(store: &MemoryStore, room_id: &str, id: &str) -> Self {
        Self {
            id: id.parse().expect("valid identity"),
            session: Arc::new(store.session()),
            paths: RoomPaths::new(room_id),
        }
    }

    pub fn paths(&self) -> &RoomPaths {
        &self.paths
    }

    pub fn pair_with(&self, other: &PeerIdentity) -> PairKey {
        PairKey::new(&self.id, other).expect("distinct identities")
    }

    fn route_to(&self, to: &PeerIdentity) -> Route {
        Route::new(&self.id, to).expect("distinct identities")
    }

    pub async fn set_flag(&self, field: &str, value: bool) {
        let mut fields = Map::new();
        fields.insert(field.to_owned(), Value::Bool(value));
        self.session
            .update(&self.paths.member(&self.id), fields)
            .await
            .expect("Failed to update presence");
    }

    pub async fn offer_to(&self, to: &PeerIdentity, sdp: &str) {
        let envelope = SignalEnvelope::Offer {
            route: self.route_to(to),
            description: SessionDescription::offer(sdp),
        };
        self.write_raw(&self.paths.offer(&self.pair_with(to)), envelope_json(&envelope))
            .await;
    }

    pub async fn answer_to(&self, to: &PeerIdentity, sdp: &str) {
        let envelope = SignalEnvelope::Answer {
            route: self.route_to(to),
            description: SessionDescription::answer(sdp),
        };
        self.write_raw(&self.paths.answer(&self.pair_with(to)), envelope_json(&envelope))
            .await;
    }

    pub async fn candidate_to(&self, to: &PeerIdentity, candidate: &str) -> String {
        let envelope = SignalEnvelope::Candidate {
            route: self.route_to(to),
            candidate: IceCandidate::new(candidate),
        };
        self.session
            .append(&self.paths.ice(&self.pair_with(to)), envelope_json(&envelope))
            .await
            .expect("Failed to append candidate")
    }

    pub async fn write_raw(&self, path: &str, value: Value) {
        self.session
            .write(path, value)
            .await
            .expect("Failed to write");
    }

    pub async fn leave(&self) {
        self.session
            .delete(&self.paths.member(&self.id))
            .await
            .expect("Failed to delete presence");
    }

    /// Drop the connection without cleanup, as a crashed client would.
    pub fn crash(&self) {
        self.session.disconnect();
    }
}

fn envelope_json(envelope: &SignalEnvelope) -> Value {
    serde_json::to_value(envelope).expect("envelope serializes")
}
