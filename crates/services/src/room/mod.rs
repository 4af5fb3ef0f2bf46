pub mod call_manager;
pub mod room_manager;

pub use call_manager::{spawn_call_gc, CallManager};
pub use room_manager::RoomManager;
