mod memory_store;
mod shared_store;
mod signaling_router;
mod store_event;

pub use memory_store::*;
pub use shared_store::*;
pub use signaling_router::*;
pub use store_event::*;
