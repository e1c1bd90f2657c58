mod presence_registry;
mod voice_activity;

pub use presence_registry::*;
pub use voice_activity::*;
