mod connection_wrapper;
mod local_audio;
mod media_session;
mod media_sink;
mod transport_config;
mod transport_event;

pub use connection_wrapper::*;
pub use local_audio::*;
pub use media_session::*;
pub use media_sink::*;
pub use transport_config::*;
pub use transport_event::*;
