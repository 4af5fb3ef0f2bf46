pub mod auth;
pub mod room;
pub mod state_store;

pub use auth::{Claims, CredentialValidator, Grants};
pub use room::{CallManager, RoomManager};
pub use state_store::{InMemoryStateStore, RedisStateStore, StateStorePort};
