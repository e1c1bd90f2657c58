use huddle_core::IceCandidate;
use tokio::sync::mpsc;

use crate::link::LinkId;
use crate::transport::media_sink::InboundStream;

/// Events a media session raises for the room loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// A local ICE candidate was gathered and must be relayed to the remote peer.
    CandidateGenerated(LinkId, IceCandidate),

    /// The remote peer's media arrived.
    InboundStream(LinkId, InboundStream),

    /// The connection failed for good. The link is torn down and recreated on
    /// the next membership pass.
    Failed(LinkId),
}

/// Sender handed to one media session. Every event it emits is tagged with the
/// link that owns the session.
#[derive(Debug, Clone)]
pub struct TransportEventSender {
    link: LinkId,
    tx: mpsc::Sender<TransportEvent>,
}

impl TransportEventSender {
    pub fn new(link: LinkId, tx: mpsc::Sender<TransportEvent>) -> Self {
        Self { link, tx }
    }

    pub fn link(&self) -> &LinkId {
        &self.link
    }

    pub async fn candidate(&self, candidate: IceCandidate) {
        let _ = self
            .tx
            .send(TransportEvent::CandidateGenerated(self.link.clone(), candidate))
            .await;
    }

    pub async fn inbound(&self, stream: InboundStream) {
        let _ = self
            .tx
            .send(TransportEvent::InboundStream(self.link.clone(), stream))
            .await;
    }

    pub async fn failed(&self) {
        let _ = self.tx.send(TransportEvent::Failed(self.link.clone())).await;
    }
}
