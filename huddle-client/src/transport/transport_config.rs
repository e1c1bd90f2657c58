use huddle_core::{IceServerConfig, RoomConfig, DEFAULT_STUN_SERVER};

/// ICE configuration handed to every new media session.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN_SERVER)],
        }
    }
}

impl From<&RoomConfig> for TransportConfig {
    fn from(config: &RoomConfig) -> Self {
        Self {
            ice_servers: config.connectivity_servers.clone(),
        }
    }
}
