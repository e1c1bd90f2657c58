use huddle_core::{PeerIdentity, Roster, VoiceActivityConfig};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use crate::error::RoomError;
use crate::presence::detect_speech;
use crate::room::room::{Room, RoomOptions};
use crate::room::room_command::{RoomCommand, RoomSnapshot};

/// Cloneable front end of a running room task.
#[derive(Clone)]
pub struct RoomHandle {
    local: PeerIdentity,
    voice: VoiceActivityConfig,
    commands: mpsc::Sender<RoomCommand>,
    roster: watch::Receiver<Roster>,
}

impl RoomHandle {
    /// Join the room described by `options` and spawn its event loop.
    ///
    /// Fails without side effects in the room when presence cannot be published.
    pub async fn connect(options: RoomOptions) -> Result<Self, RoomError> {
        let local = options.identity.clone();
        let voice = options.config.voice;
        let room_id = options.config.room_id.clone();

        let (tx, rx) = mpsc::channel(100);
        let room = Room::join(options, rx).await?;
        let roster = room.subscribe_roster();
        tokio::spawn(room.run());

        info!("Room {} running for {}", room_id, local);
        Ok(Self {
            local,
            voice,
            commands: tx,
            roster,
        })
    }

    pub fn local(&self) -> &PeerIdentity {
        &self.local
    }

    /// Latest member map. Updated after every membership pass.
    pub fn roster(&self) -> watch::Receiver<Roster> {
        self.roster.clone()
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), RoomError> {
        self.send(RoomCommand::SetMuted(muted)).await
    }

    /// Feed a raw speech verdict, e.g. from an external detector.
    pub async fn set_speaking(&self, voiced: bool) -> Result<(), RoomError> {
        self.send(RoomCommand::SetSpeaking(voiced)).await
    }

    /// Feed one frame of unsigned 8-bit time-domain samples.
    pub async fn submit_voice_frame(&self, frame: &[u8]) -> Result<(), RoomError> {
        let voiced = detect_speech(frame, self.voice.threshold);
        self.set_speaking(voiced).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomCommand::Inspect(tx)).await?;
        rx.await.map_err(|_| RoomError::Closed)
    }

    /// Withdraw presence, close every link and stop the room task.
    pub async fn leave(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomCommand::Leave(tx)).await?;
        rx.await.map_err(|_| RoomError::Closed)
    }

    /// Close every link and stop, leaving presence to the store's disconnect hook.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomCommand::Shutdown(tx)).await?;
        rx.await.map_err(|_| RoomError::Closed)
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.commands.send(cmd).await.map_err(|_| RoomError::Closed)
    }
}
