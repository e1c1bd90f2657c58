use huddle_core::PeerIdentity;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use webrtc::track::track_remote::TrackRemote;

/// Remote media delivered by a session.
#[derive(Clone)]
pub struct InboundStream {
    stream_id: String,
    track_id: String,
    remote: Option<Arc<TrackRemote>>,
}

impl InboundStream {
    pub fn new(stream_id: impl Into<String>, track_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            track_id: track_id.into(),
            remote: None,
        }
    }

    pub fn from_remote(track: Arc<TrackRemote>) -> Self {
        Self {
            stream_id: track.stream_id(),
            track_id: track.id(),
            remote: Some(track),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    /// The underlying RTP track when the session is webrtc-backed.
    pub fn remote_track(&self) -> Option<&Arc<TrackRemote>> {
        self.remote.as_ref()
    }
}

impl fmt::Debug for InboundStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundStream")
            .field("stream_id", &self.stream_id)
            .field("track_id", &self.track_id)
            .field("rtp", &self.remote.is_some())
            .finish()
    }
}

/// Playback endpoint for one remote peer. Owned by that peer's link.
pub trait MediaSink: Send + Sync {
    fn attach(&mut self, stream: InboundStream);

    /// Stop playback and free the endpoint. Called exactly once when the link closes.
    fn release(&mut self);
}

/// Source of per-peer sinks, usually backed by the UI's audio elements.
pub trait MediaOutput: Send + Sync {
    fn create_sink(&self, remote: &PeerIdentity) -> Box<dyn MediaSink>;
}

#[derive(Debug, Clone)]
pub enum SinkEvent {
    Created(PeerIdentity),
    Attached(PeerIdentity, InboundStream),
    Released(PeerIdentity),
}

/// [`MediaOutput`] that reports sink lifecycle on a channel, for a playback
/// layer living on another task.
#[derive(Clone)]
pub struct ChannelOutput {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelOutput {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MediaOutput for ChannelOutput {
    fn create_sink(&self, remote: &PeerIdentity) -> Box<dyn MediaSink> {
        let _ = self.tx.send(SinkEvent::Created(remote.clone()));
        Box::new(ChannelSink {
            remote: remote.clone(),
            tx: self.tx.clone(),
            released: false,
        })
    }
}

struct ChannelSink {
    remote: PeerIdentity,
    tx: mpsc::UnboundedSender<SinkEvent>,
    released: bool,
}

impl MediaSink for ChannelSink {
    fn attach(&mut self, stream: InboundStream) {
        if self.released {
            return;
        }
        debug!("Attaching inbound stream {} for {}", stream.stream_id(), self.remote);
        let _ = self
            .tx
            .send(SinkEvent::Attached(self.remote.clone(), stream));
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        let _ = self.tx.send(SinkEvent::Released(self.remote.clone()));
    }
}
