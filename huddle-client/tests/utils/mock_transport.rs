use anyhow::{Result, bail};
use async_trait::async_trait;
use huddle_client::{
    InboundStream, LocalAudio, MediaSession, TransportConfig, TransportEventSender,
    TransportFactory,
};
use huddle_core::{IceCandidate, PeerIdentity, SdpKind, SessionDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Every call a room makes on a mock session, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    AddTrack,
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(IceCandidate),
    Close,
}

/// Test-side view of one mock session.
#[derive(Clone)]
pub struct MockSessionHandle {
    pub remote: PeerIdentity,
    pub epoch: u64,
    calls: Arc<Mutex<Vec<SessionCall>>>,
    events: TransportEventSender,
}

impl MockSessionHandle {
    pub async fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().await.clone()
    }

    pub async fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                SessionCall::SetRemote(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    /// Remote candidates applied, in application order.
    pub async fn candidates(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                SessionCall::AddCandidate(c) => Some(c.candidate.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn is_closed(&self) -> bool {
        self.calls.lock().await.contains(&SessionCall::Close)
    }

    /// Pretend ICE gathered a local candidate.
    pub async fn emit_candidate(&self, candidate: &str) {
        self.events.candidate(IceCandidate::new(candidate)).await;
    }

    pub async fn emit_inbound(&self, stream_id: &str) {
        self.events
            .inbound(InboundStream::new(stream_id, "audio"))
            .await;
    }

    pub async fn emit_failure(&self) {
        self.events.failed().await;
    }
}

/// TransportFactory that records calls instead of doing any networking.
///
/// Descriptions it produces start with `v=0`; a remote description that does
/// not is rejected, as a real engine rejects unparsable SDP.
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    sessions: Arc<Mutex<Vec<MockSessionHandle>>>,
    fail_create: Arc<AtomicBool>,
    created: Arc<AtomicUsize>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_creation(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub async fn sessions(&self) -> Vec<MockSessionHandle> {
        self.sessions.lock().await.clone()
    }

    pub async fn sessions_for(&self, remote: &PeerIdentity) -> Vec<MockSessionHandle> {
        self.sessions
            .lock()
            .await
            .iter()
            .filter(|s| &s.remote == remote)
            .cloned()
            .collect()
    }

    pub async fn latest_for(&self, remote: &PeerIdentity) -> Option<MockSessionHandle> {
        self.sessions_for(remote).await.pop()
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        _config: &TransportConfig,
        events: TransportEventSender,
    ) -> Result<Box<dyn MediaSession>> {
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("mock transport creation disabled");
        }
        let serial = self.created.fetch_add(1, Ordering::SeqCst);
        let calls = Arc::new(Mutex::new(Vec::new()));

        self.sessions.lock().await.push(MockSessionHandle {
            remote: events.link().remote.clone(),
            epoch: events.link().epoch,
            calls: calls.clone(),
            events,
        });

        Ok(Box::new(MockSession { serial, calls }))
    }
}

struct MockSession {
    serial: usize,
    calls: Arc<Mutex<Vec<SessionCall>>>,
}

#[async_trait]
impl MediaSession for MockSession {
    async fn add_outbound_track(&self, _audio: &LocalAudio) -> Result<()> {
        self.calls.lock().await.push(SessionCall::AddTrack);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.calls.lock().await.push(SessionCall::CreateOffer);
        Ok(SessionDescription::offer(format!(
            "v=0 mock-offer {}",
            self.serial
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.calls.lock().await.push(SessionCall::CreateAnswer);
        Ok(SessionDescription::answer(format!(
            "v=0 mock-answer {}",
            self.serial
        )))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.calls.lock().await.push(SessionCall::SetLocal(description));
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        if !description.sdp.starts_with("v=0") {
            bail!("unparsable sdp");
        }
        if description.kind == SdpKind::Answer
            && !self
                .calls
                .lock()
                .await
                .iter()
                .any(|c| matches!(c, SessionCall::SetLocal(_)))
        {
            bail!("answer without a local offer");
        }
        self.calls.lock().await.push(SessionCall::SetRemote(description));
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.calls.lock().await.push(SessionCall::AddCandidate(candidate));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.calls.lock().await.push(SessionCall::Close);
        Ok(())
    }
}
