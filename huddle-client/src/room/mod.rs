mod room;
mod room_command;
mod room_handle;

pub use room::*;
pub use room_command::*;
pub use room_handle::*;
