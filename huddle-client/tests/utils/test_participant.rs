use huddle_client::{
    ChannelOutput, LocalAudio, MemorySession, MemoryStore, PeerLinkState, RoomError, RoomHandle,
    RoomOptions, RoomSnapshot, SinkEvent,
};
use huddle_core::{PeerIdentity, RoomConfig};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::mock_transport::MockTransportFactory;
use super::wait::{WAIT_TIMEOUT_MS, wait_until};

/// A full room participant on mock transports.
pub struct TestParticipant {
    pub id: PeerIdentity,
    pub handle: RoomHandle,
    pub session: Arc<MemorySession>,
    pub transports: MockTransportFactory,
    pub sinks: mpsc::UnboundedReceiver<SinkEvent>,
}

impl TestParticipant {
    pub async fn join(store: &MemoryStore, room_id: &str, id: &str) -> Result<Self, RoomError> {
        Self::join_with(store, RoomConfig::new(room_id), id).await
    }

    pub async fn join_with(
        store: &MemoryStore,
        config: RoomConfig,
        id: &str,
    ) -> Result<Self, RoomError> {
        let id: PeerIdentity = id.parse().expect("valid identity");
        let session = Arc::new(store.session());
        let transports = MockTransportFactory::new();
        let (output, sinks) = ChannelOutput::channel();

        let handle = RoomHandle::connect(RoomOptions {
            config,
            identity: id.clone(),
            store: session.clone(),
            transports: Arc::new(transports.clone()),
            output: Arc::new(output),
            audio: LocalAudio::opus(id.as_str()),
        })
        .await?;

        Ok(Self {
            id,
            handle,
            session,
            transports,
            sinks,
        })
    }

    pub async fn snapshot(&self) -> RoomSnapshot {
        self.handle.snapshot().await.expect("room task is running")
    }

    pub async fn link_state(&self, remote: &PeerIdentity) -> Option<PeerLinkState> {
        self.snapshot().await.links.get(remote).copied()
    }

    /// Wait until the link to `remote` reaches `state`.
    pub async fn wait_for_link(&self, remote: &PeerIdentity, state: PeerLinkState) -> bool {
        wait_until(WAIT_TIMEOUT_MS, move || async move {
            self.link_state(remote).await == Some(state)
        })
        .await
    }

    pub async fn wait_for_no_link(&self, remote: &PeerIdentity) -> bool {
        wait_until(WAIT_TIMEOUT_MS, move || async move {
            self.link_state(remote).await.is_none()
        })
        .await
    }

    /// Sink events received so far.
    pub fn drain_sink_events(&mut self) -> Vec<SinkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.sinks.try_recv() {
            events.push(event);
        }
        events
    }
}
