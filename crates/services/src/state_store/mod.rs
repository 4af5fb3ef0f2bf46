pub mod memory;
pub mod port;
pub mod redis_store;

pub use memory::InMemoryStateStore;
pub use port::{get, set, StateStorePort};
pub use redis_store::RedisStateStore;
