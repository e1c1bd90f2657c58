use anyhow::Result;
use async_trait::async_trait;
use huddle_core::{IceCandidate, SessionDescription};

use crate::transport::local_audio::LocalAudio;
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::TransportEventSender;

/// One peer connection, seen only through the operations signaling needs.
#[async_trait]
pub trait MediaSession: Send + Sync {
    async fn add_outbound_track(&self, audio: &LocalAudio) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Creates media sessions. Local candidates, inbound streams and failures are
/// reported through `events`.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        config: &TransportConfig,
        events: TransportEventSender,
    ) -> Result<Box<dyn MediaSession>>;
}
