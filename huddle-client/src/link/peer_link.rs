use huddle_core::{
    IceCandidate, NegotiationRole, PairKey, PeerIdentity, Route, SdpKind, SignalEnvelope,
};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::link::link_state::{IgnoreReason, LinkId, PeerLinkState, SignalOutcome};
use crate::signaling::{PairWatch, SignalingRouter, StoreEvent};
use crate::transport::{
    InboundStream, LocalAudio, MediaOutput, MediaSession, MediaSink, TransportConfig,
    TransportEvent, TransportEventSender, TransportFactory,
};

/// Everything a link needs from its room, owned by the room and lent to each
/// link call.
pub struct LinkContext {
    pub router: SignalingRouter,
    pub transports: Arc<dyn TransportFactory>,
    pub output: Arc<dyn MediaOutput>,
    pub audio: LocalAudio,
    pub transport_config: TransportConfig,
    pub store_tx: mpsc::UnboundedSender<StoreEvent>,
    pub transport_tx: mpsc::Sender<TransportEvent>,
}

/// Negotiation and media state towards one remote participant.
///
/// The tie-break fixes the role at creation: the greater identity offers, the
/// other answers. Each description is consumed at most once, and candidates
/// that arrive before the remote description are held back and applied in
/// arrival order once it is set.
///
/// Recovery after a transport failure is driven by the offerer. A recreated
/// answerer link waits in `AwaitingOffer` until the offerer's own link is
/// recreated too, since a `Connected` offerer never offers again.
pub struct PeerLink {
    id: LinkId,
    local: PeerIdentity,
    pair: PairKey,
    role: NegotiationRole,
    state: PeerLinkState,
    session: Option<Box<dyn MediaSession>>,
    sink: Option<Box<dyn MediaSink>>,
    watch: Option<PairWatch>,
    offer_sent: bool,
    remote_description_set: bool,
    pending_candidates: Vec<IceCandidate>,
    seen_candidate_keys: HashSet<String>,
    applied_candidates: HashSet<IceCandidate>,
    written: Vec<String>,
}

impl PeerLink {
    /// `None` when `remote` is the local participant.
    pub fn new(local: PeerIdentity, remote: PeerIdentity, epoch: u64) -> Option<Self> {
        let pair = PairKey::new(&local, &remote)?;
        let role = NegotiationRole::between(&local, &remote)?;

        Some(Self {
            id: LinkId { remote, epoch },
            local,
            pair,
            role,
            state: PeerLinkState::Idle,
            session: None,
            sink: None,
            watch: None,
            offer_sent: false,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            seen_candidate_keys: HashSet::new(),
            applied_candidates: HashSet::new(),
            written: Vec::new(),
        })
    }

    pub fn id(&self) -> &LinkId {
        &self.id
    }

    pub fn remote(&self) -> &PeerIdentity {
        &self.id.remote
    }

    pub fn epoch(&self) -> u64 {
        self.id.epoch
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn state(&self) -> PeerLinkState {
        self.state
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Create the transport, attach local audio and subscribe to the pair's
    /// signaling paths. The offerer then publishes its offer.
    pub async fn start(&mut self, ctx: &LinkContext) -> Result<(), LinkError> {
        if self.state != PeerLinkState::Idle {
            return Ok(());
        }

        let events = TransportEventSender::new(self.id.clone(), ctx.transport_tx.clone());
        let session = ctx
            .transports
            .create(&ctx.transport_config, events)
            .await
            .map_err(|e| self.setup_failure(e))?;
        let attached = session.add_outbound_track(&ctx.audio).await;
        self.session = Some(session);
        attached.map_err(|e| self.setup_failure(e))?;

        self.sink = Some(ctx.output.create_sink(&self.id.remote));

        if self.role == NegotiationRole::Offerer {
            ctx.router.clear_answer(&self.pair).await?;
        }
        self.watch = Some(
            ctx.router
                .watch_pair(&self.pair, &self.id, &ctx.store_tx)
                .await?,
        );

        match self.role {
            NegotiationRole::Offerer => {
                self.send_offer(ctx).await?;
                self.state = PeerLinkState::AwaitingAnswer;
            }
            NegotiationRole::Answerer => self.state = PeerLinkState::AwaitingOffer,
        }

        info!(
            "Link to {} started as {:?} (epoch {})",
            self.id.remote, self.role, self.id.epoch
        );
        Ok(())
    }

    async fn send_offer(&mut self, ctx: &LinkContext) -> Result<(), LinkError> {
        if self.offer_sent {
            return Ok(());
        }
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };

        let offer = session
            .create_offer()
            .await
            .map_err(|e| self.setup_failure(e))?;
        session
            .set_local_description(offer.clone())
            .await
            .map_err(|e| self.setup_failure(e))?;

        let envelope = SignalEnvelope::Offer {
            route: self.outbound_route(),
            description: offer,
        };
        let path = ctx.router.send_offer(&envelope).await?;
        self.written.push(path);
        self.offer_sent = true;

        debug!("Offer sent to {}", self.id.remote);
        Ok(())
    }

    /// Apply the pair's offer slot. Only the answerer consumes offers.
    pub async fn handle_offer(
        &mut self,
        snapshot: &Value,
        ctx: &LinkContext,
    ) -> Result<SignalOutcome, LinkError> {
        let envelope = match ctx.router.decode_description(snapshot) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return Ok(SignalOutcome::Ignored(IgnoreReason::Empty)),
            Err(e) => {
                self.discard_offer(ctx).await;
                return Err(self.malformed(e));
            }
        };
        let SignalEnvelope::Offer { route, description } = envelope else {
            self.discard_offer(ctx).await;
            return Err(self.malformed("offer slot holds a non-offer message"));
        };

        if let Some(reason) = self.screen(&route) {
            return Ok(SignalOutcome::Ignored(reason));
        }
        if self.role == NegotiationRole::Offerer {
            warn!(
                "Ignoring offer from {}: it loses the tie-break against {}",
                self.id.remote, self.local
            );
            return Ok(SignalOutcome::Ignored(IgnoreReason::DuplicateOfferRace));
        }
        if self.remote_description_set {
            return Ok(SignalOutcome::Ignored(IgnoreReason::Replay));
        }
        if self.state != PeerLinkState::AwaitingOffer {
            return Ok(SignalOutcome::Ignored(IgnoreReason::WrongState));
        }

        // Consumed before applying, so a bad offer is not retried forever.
        self.discard_offer(ctx).await;

        if description.kind != SdpKind::Offer {
            return Err(self.malformed("offer slot holds an answer description"));
        }
        let Some(session) = self.session.as_ref() else {
            return Ok(SignalOutcome::Ignored(IgnoreReason::WrongState));
        };
        session
            .set_remote_description(description)
            .await
            .map_err(|e| self.malformed(format!("{e:#}")))?;
        self.remote_description_set = true;

        let answer = session
            .create_answer()
            .await
            .map_err(|e| self.setup_failure(e))?;
        session
            .set_local_description(answer.clone())
            .await
            .map_err(|e| self.setup_failure(e))?;

        let envelope = SignalEnvelope::Answer {
            route: self.outbound_route(),
            description: answer,
        };
        let path = ctx.router.send_answer(&envelope).await?;
        self.written.push(path);
        self.state = PeerLinkState::Connected;

        info!("Answered offer from {}", self.id.remote);
        self.flush_candidates().await;
        Ok(SignalOutcome::Applied)
    }

    /// Apply the pair's answer slot. Only the offerer consumes answers.
    pub async fn handle_answer(
        &mut self,
        snapshot: &Value,
        ctx: &LinkContext,
    ) -> Result<SignalOutcome, LinkError> {
        let envelope = match ctx.router.decode_description(snapshot) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return Ok(SignalOutcome::Ignored(IgnoreReason::Empty)),
            Err(e) => {
                self.discard_answer(ctx).await;
                return Err(self.malformed(e));
            }
        };
        let SignalEnvelope::Answer { route, description } = envelope else {
            self.discard_answer(ctx).await;
            return Err(self.malformed("answer slot holds a non-answer message"));
        };

        if let Some(reason) = self.screen(&route) {
            return Ok(SignalOutcome::Ignored(reason));
        }
        if self.role == NegotiationRole::Answerer {
            return Ok(SignalOutcome::Ignored(IgnoreReason::WrongState));
        }
        if self.remote_description_set {
            return Ok(SignalOutcome::Ignored(IgnoreReason::Replay));
        }
        if self.state != PeerLinkState::AwaitingAnswer {
            return Ok(SignalOutcome::Ignored(IgnoreReason::WrongState));
        }

        self.discard_answer(ctx).await;

        if description.kind != SdpKind::Answer {
            return Err(self.malformed("answer slot holds an offer description"));
        }
        let Some(session) = self.session.as_ref() else {
            return Ok(SignalOutcome::Ignored(IgnoreReason::WrongState));
        };
        session
            .set_remote_description(description)
            .await
            .map_err(|e| self.malformed(format!("{e:#}")))?;
        self.remote_description_set = true;
        self.state = PeerLinkState::Connected;

        info!("Answer from {} applied", self.id.remote);
        self.flush_candidates().await;
        Ok(SignalOutcome::Applied)
    }

    /// Process the pair's candidate list. Returns how many new remote candidates
    /// were applied or queued. Bad entries are skipped, never fatal.
    pub async fn handle_candidates(&mut self, snapshot: &Value, ctx: &LinkContext) -> usize {
        let mut accepted = 0;

        for (key, decoded) in ctx.router.decode_candidates(snapshot) {
            if !self.seen_candidate_keys.insert(key.clone()) {
                continue;
            }
            let envelope = match decoded {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(
                        "Skipping malformed candidate {} from {}: {}",
                        key, self.id.remote, e
                    );
                    continue;
                }
            };
            let SignalEnvelope::Candidate { route, candidate } = envelope else {
                warn!("Skipping non-candidate entry {} in candidate list", key);
                continue;
            };
            if self.screen(&route).is_some() {
                continue;
            }
            if self.applied_candidates.contains(&candidate)
                || self.pending_candidates.contains(&candidate)
            {
                continue;
            }

            accepted += 1;
            if self.remote_description_set {
                self.apply_candidate(candidate).await;
            } else {
                self.pending_candidates.push(candidate);
            }
        }

        if accepted > 0 && !self.remote_description_set {
            debug!(
                "Buffered {} candidates from {} until the remote description is set",
                self.pending_candidates.len(),
                self.id.remote
            );
        }
        accepted
    }

    /// Relay a locally gathered candidate. A failed write only loses that candidate.
    pub async fn send_local_candidate(&mut self, candidate: IceCandidate, ctx: &LinkContext) {
        if self.state == PeerLinkState::Closed {
            return;
        }
        let envelope = SignalEnvelope::Candidate {
            route: self.outbound_route(),
            candidate,
        };
        match ctx.router.send_candidate(&envelope).await {
            Ok(path) => self.written.push(path),
            Err(e) => warn!("Failed to relay candidate to {}: {}", self.id.remote, e),
        }
    }

    pub fn attach_inbound(&mut self, stream: InboundStream) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        info!(
            "Playing stream {} from {}",
            stream.stream_id(),
            self.id.remote
        );
        sink.attach(stream);
    }

    /// Tear the link down: cancel the pair watches, close the transport,
    /// release the sink and retract the signaling paths this link wrote.
    /// Safe to call more than once.
    pub async fn close(&mut self, ctx: &LinkContext) {
        if self.state == PeerLinkState::Closed {
            return;
        }
        self.state = PeerLinkState::Closed;

        if let Some(watch) = self.watch.take() {
            ctx.router.unwatch_pair(watch).await;
        }
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Failed to close transport for {}: {}", self.id.remote, e);
            }
        }
        if let Some(mut sink) = self.sink.take() {
            sink.release();
        }

        let written = std::mem::take(&mut self.written);
        ctx.router.retract(&written).await;
        self.pending_candidates.clear();

        info!("Link to {} closed (epoch {})", self.id.remote, self.id.epoch);
    }

    async fn apply_candidate(&mut self, candidate: IceCandidate) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if let Err(e) = session.add_remote_candidate(candidate.clone()).await {
            warn!("Failed to add candidate from {}: {:?}", self.id.remote, e);
        }
        self.applied_candidates.insert(candidate);
    }

    async fn flush_candidates(&mut self) {
        for candidate in std::mem::take(&mut self.pending_candidates) {
            self.apply_candidate(candidate).await;
        }
    }

    async fn discard_offer(&self, ctx: &LinkContext) {
        if let Err(e) = ctx.router.consume_offer(&self.pair).await {
            warn!("Failed to consume offer for pair {}: {}", self.pair, e);
        }
    }

    async fn discard_answer(&self, ctx: &LinkContext) {
        if let Err(e) = ctx.router.consume_answer(&self.pair).await {
            warn!("Failed to consume answer for pair {}: {}", self.pair, e);
        }
    }

    fn screen(&self, route: &Route) -> Option<IgnoreReason> {
        if route.from == self.local {
            return Some(IgnoreReason::Echo);
        }
        if route.pair != self.pair || route.from != self.id.remote || route.to != self.local {
            return Some(IgnoreReason::Misaddressed);
        }
        None
    }

    fn outbound_route(&self) -> Route {
        Route {
            pair: self.pair.clone(),
            from: self.local.clone(),
            to: self.id.remote.clone(),
        }
    }

    fn malformed(&self, reason: impl Display) -> LinkError {
        LinkError::MalformedSignalingPayload {
            peer: self.id.remote.clone(),
            reason: reason.to_string(),
        }
    }

    fn setup_failure(&self, source: anyhow::Error) -> LinkError {
        LinkError::TransportSetupFailure {
            peer: self.id.remote.clone(),
            source,
        }
    }
}
