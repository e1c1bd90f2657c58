use crate::error::{LinkError, PresenceError, RoomError};
use crate::link::{LinkContext, LinkId, PeerLink, SignalOutcome};
use crate::presence::{PresenceRegistry, SpeakingGate};
use crate::room::room_command::{RoomCommand, RoomSnapshot};
use crate::signaling::{SharedStore, SignalChannel, SignalingRouter, StoreEvent, WatchCallback};
use crate::transport::{
    LocalAudio, MediaOutput, TransportConfig, TransportEvent, TransportFactory,
};
use futures::future::join_all;
use huddle_core::{PeerIdentity, RoomConfig, Roster};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

/// What a participant brings into a room.
pub struct RoomOptions {
    pub config: RoomConfig,
    pub identity: PeerIdentity,
    pub store: Arc<dyn SharedStore>,
    pub transports: Arc<dyn TransportFactory>,
    pub output: Arc<dyn MediaOutput>,
    pub audio: LocalAudio,
}

/// Coordinator of one participant's session in a room.
///
/// Owns every [`PeerLink`] and processes membership snapshots, pair signaling
/// snapshots, transport events and commands one at a time on a single task.
pub struct Room {
    room_id: String,
    local: PeerIdentity,
    presence: PresenceRegistry,
    links: HashMap<PeerIdentity, PeerLink>,
    ctx: LinkContext,
    gate: SpeakingGate,
    next_epoch: u64,
    command_rx: mpsc::Receiver<RoomCommand>,
    store_rx: mpsc::UnboundedReceiver<StoreEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    roster_tx: watch::Sender<Roster>,
}

impl Room {
    /// Publish presence and start watching the member map. Nothing else
    /// happens until [`Room::run`] drains the first snapshot.
    pub async fn join(
        options: RoomOptions,
        command_rx: mpsc::Receiver<RoomCommand>,
    ) -> Result<Self, RoomError> {
        let RoomOptions {
            config,
            identity,
            store,
            transports,
            output,
            audio,
        } = options;
        config.validate()?;

        let paths = config.paths();
        let (store_tx, store_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::channel(256);

        let mut presence = PresenceRegistry::new(store.clone(), paths.clone());
        presence.join(identity.clone()).await?;

        let members_tx = store_tx.clone();
        let on_members: WatchCallback = Arc::new(move |snapshot| {
            let _ = members_tx.send(StoreEvent::Members(snapshot));
        });
        if let Err(e) = presence.watch_members(on_members).await {
            let _ = presence.leave().await;
            return Err(e.into());
        }

        info!("Joined room {} as {}", config.room_id, identity);

        let (roster_tx, _) = watch::channel(Roster::new());
        Ok(Self {
            room_id: config.room_id.clone(),
            local: identity.clone(),
            presence,
            links: HashMap::new(),
            ctx: LinkContext {
                router: SignalingRouter::new(store, paths, identity),
                transports,
                output,
                audio,
                transport_config: TransportConfig::from(&config),
                store_tx,
                transport_tx,
            },
            gate: SpeakingGate::new(config.voice.hangover()),
            next_epoch: 0,
            command_rx,
            store_rx,
            transport_rx,
            roster_tx,
        })
    }

    pub fn local(&self) -> &PeerIdentity {
        &self.local
    }

    pub fn subscribe_roster(&self) -> watch::Receiver<Roster> {
        self.roster_tx.subscribe()
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.room_id);

        loop {
            let expiry = self.gate.expiry();

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => {
                            if self.handle_command(c).await.is_break() {
                                break;
                            }
                        }
                        None => {
                            info!("Command channel closed. Shutting down room.");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                evt = self.store_rx.recv() => {
                    match evt {
                        Some(e) => self.handle_store_event(e).await,
                        None => {
                            warn!("Store channel closed unexpectedly");
                            break;
                        }
                    }
                }

                evt = self.transport_rx.recv() => {
                    match evt {
                        Some(e) => self.handle_transport_event(e).await,
                        None => {
                            warn!("Transport channel closed unexpectedly");
                            break;
                        }
                    }
                }

                _ = sleep_until(expiry.unwrap_or_else(Instant::now)), if expiry.is_some() => {
                    let changed = self.gate.refresh(Instant::now());
                    self.publish_speaking(changed).await;
                }
            }
        }

        info!("Room {} event loop finished", self.room_id);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::SetMuted(muted) => {
                if self.gate.is_muted() == muted {
                    return ControlFlow::Continue(());
                }
                self.ctx.audio.set_muted(muted);
                let changed = self.gate.set_muted(muted);
                if let Err(e) = self.presence.set_muted(muted).await {
                    warn!("Failed to publish mute state: {}", e);
                }
                self.publish_speaking(changed).await;
            }

            RoomCommand::SetSpeaking(voiced) => {
                let changed = self.gate.observe(voiced, Instant::now());
                self.publish_speaking(changed).await;
            }

            RoomCommand::Inspect(reply) => {
                let _ = reply.send(self.snapshot());
            }

            RoomCommand::Leave(done) => {
                match self.presence.leave().await {
                    Ok(()) | Err(PresenceError::NotJoined) => {}
                    Err(e) => warn!("Failed to withdraw presence: {}", e),
                }
                self.shutdown().await;
                let _ = done.send(());
                return ControlFlow::Break(());
            }

            RoomCommand::Shutdown(done) => {
                self.shutdown().await;
                let _ = done.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_store_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Members(snapshot) => {
                let roster = PresenceRegistry::decode_members(&snapshot);
                self.reconcile(&roster).await;
                self.roster_tx.send_replace(roster);
            }

            StoreEvent::Signal {
                link,
                channel,
                snapshot,
            } => {
                let Some(peer_link) = self
                    .links
                    .get_mut(&link.remote)
                    .filter(|current| current.id() == &link)
                else {
                    debug!("Dropping {:?} snapshot for stale link {:?}", channel, link);
                    return;
                };

                let outcome = match channel {
                    SignalChannel::Offer => peer_link.handle_offer(&snapshot, &self.ctx).await,
                    SignalChannel::Answer => peer_link.handle_answer(&snapshot, &self.ctx).await,
                    SignalChannel::Candidates => {
                        peer_link.handle_candidates(&snapshot, &self.ctx).await;
                        Ok(SignalOutcome::Applied)
                    }
                };

                match outcome {
                    Ok(SignalOutcome::Applied) => {}
                    Ok(SignalOutcome::Ignored(reason)) => {
                        debug!(
                            "Ignored {:?} snapshot from {}: {:?}",
                            channel, link.remote, reason
                        );
                    }
                    Err(e) => self.fail_link(&link, e).await,
                }
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateGenerated(link, candidate) => {
                let Some(peer_link) = self
                    .links
                    .get_mut(&link.remote)
                    .filter(|current| current.id() == &link)
                else {
                    return;
                };
                peer_link.send_local_candidate(candidate, &self.ctx).await;
            }

            TransportEvent::InboundStream(link, stream) => {
                let Some(peer_link) = self.current_link(&link) else {
                    debug!("Dropping inbound stream for stale link {:?}", link);
                    return;
                };
                peer_link.attach_inbound(stream);
            }

            TransportEvent::Failed(link) => {
                if self.current_link(&link).is_none() {
                    return;
                }
                warn!("Transport to {} failed", link.remote);
                self.drop_link(&link.remote).await;
            }
        }
    }

    /// Bring the link set in line with `roster`: close links to departed
    /// participants, then open links to new ones.
    async fn reconcile(&mut self, roster: &Roster) {
        let departed: Vec<PeerIdentity> = self
            .links
            .keys()
            .filter(|id| !roster.contains(id))
            .cloned()
            .collect();
        for id in departed {
            info!("{} left room {}", id, self.room_id);
            self.drop_link(&id).await;
        }

        let joined: Vec<PeerIdentity> = roster
            .ids()
            .filter(|id| **id != self.local && !self.links.contains_key(*id))
            .cloned()
            .collect();
        for id in joined {
            self.open_link(id).await;
        }
    }

    async fn open_link(&mut self, remote: PeerIdentity) {
        self.next_epoch += 1;
        let Some(link) = PeerLink::new(self.local.clone(), remote.clone(), self.next_epoch) else {
            return;
        };
        info!("{} joined room {}", remote, self.room_id);

        let link = self.links.entry(remote.clone()).or_insert(link);
        if let Err(e) = link.start(&self.ctx).await {
            error!("Failed to open link to {}: {}", remote, e);
            self.drop_link(&remote).await;
        }
    }

    async fn fail_link(&mut self, link: &LinkId, e: LinkError) {
        error!("Link to {} failed: {}", link.remote, e);
        self.drop_link(&link.remote).await;
    }

    async fn drop_link(&mut self, remote: &PeerIdentity) {
        let Some(mut link) = self.links.remove(remote) else {
            return;
        };
        link.close(&self.ctx).await;
    }

    fn current_link(&mut self, id: &LinkId) -> Option<&mut PeerLink> {
        self.links
            .get_mut(&id.remote)
            .filter(|current| current.id() == id)
    }

    async fn publish_speaking(&self, changed: Option<bool>) {
        let Some(speaking) = changed else {
            return;
        };
        if let Err(e) = self.presence.set_speaking(speaking).await {
            warn!("Failed to publish speaking state: {}", e);
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            local: self.local.clone(),
            links: self
                .links
                .iter()
                .map(|(id, link)| (id.clone(), link.state()))
                .collect(),
            muted: self.gate.is_muted(),
            speaking: self.gate.is_speaking(),
        }
    }

    async fn shutdown(&mut self) {
        self.presence.unwatch_members().await;

        let ctx = &self.ctx;
        let closing = self.links.drain().map(move |(_, mut link)| async move {
            link.close(ctx).await;
        });
        join_all(closing).await;
    }
}
