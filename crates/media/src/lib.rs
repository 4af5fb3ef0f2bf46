pub mod adapter;
pub mod codecs;
pub mod factory;
pub mod ownership;
pub mod port;
pub mod sweeper;
pub mod types;
pub mod worker_pool;

pub use adapter::MediasoupAdapter;
pub use factory::RoomMedia;
pub use port::MediaEnginePort;
pub use worker_pool::WorkerPool;
