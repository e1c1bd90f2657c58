use crate::model::pair::PairKey;
use crate::model::peer::PeerIdentity;
use crate::model::signaling::IceServerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("room id must not be empty")]
    EmptyRoomId,

    #[error("room id `{0}` contains a path separator")]
    InvalidRoomId(String),

    #[error("connectivity server #{0} has no urls")]
    EmptyServer(usize),
}

/// Thresholds for turning raw audio frames into a speaking flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceActivityConfig {
    /// Deviation from the 128 midpoint of an unsigned 8-bit sample that counts as voice.
    pub threshold: u8,
    /// How long speaking stays on after the last voiced frame.
    pub hangover_ms: u64,
}

impl VoiceActivityConfig {
    pub fn hangover(&self) -> Duration {
        Duration::from_millis(self.hangover_ms)
    }
}

impl Default for VoiceActivityConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            hangover_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub room_id: String,
    #[serde(default = "default_connectivity_servers")]
    pub connectivity_servers: Vec<IceServerConfig>,
    #[serde(default)]
    pub voice: VoiceActivityConfig,
}

fn default_connectivity_servers() -> Vec<IceServerConfig> {
    vec![IceServerConfig::stun(DEFAULT_STUN_SERVER)]
}

impl RoomConfig {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            connectivity_servers: default_connectivity_servers(),
            voice: VoiceActivityConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_id.is_empty() {
            return Err(ConfigError::EmptyRoomId);
        }
        if self.room_id.contains('/') {
            return Err(ConfigError::InvalidRoomId(self.room_id.clone()));
        }
        if let Some(i) = self
            .connectivity_servers
            .iter()
            .position(|s| s.urls.is_empty())
        {
            return Err(ConfigError::EmptyServer(i));
        }
        Ok(())
    }

    pub fn paths(&self) -> RoomPaths {
        RoomPaths::new(&self.room_id)
    }
}

/// Store-agnostic path layout of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPaths {
    root: String,
}

impl RoomPaths {
    pub fn new(room_id: &str) -> Self {
        Self {
            root: format!("room/{room_id}"),
        }
    }

    pub fn members(&self) -> String {
        format!("{}/members", self.root)
    }

    pub fn member(&self, id: &PeerIdentity) -> String {
        format!("{}/members/{id}", self.root)
    }

    pub fn offer(&self, pair: &PairKey) -> String {
        format!("{}/offers/{pair}", self.root)
    }

    pub fn answer(&self, pair: &PairKey) -> String {
        format!("{}/answers/{pair}", self.root)
    }

    pub fn ice(&self, pair: &PairKey) -> String {
        format!("{}/ice/{pair}", self.root)
    }

    pub fn ice_entry(&self, pair: &PairKey, key: &str) -> String {
        format!("{}/ice/{pair}/{key}", self.root)
    }
}
