use std::sync::Arc;
use std::time::Duration;

use mediasoup::router::RouterOptions;
use sfunet_config::{AdapterSettings, EngineSettings};
use sfunet_domain::{DomainError, ErrorKind};

use crate::adapter::MediasoupAdapter;
use crate::codecs::media_codecs;
use crate::port::MediaEnginePort;
use crate::sweeper::spawn_orphan_sweeper;
use crate::worker_pool::WorkerPool;

/// A room's adapter plus the background sweep task that watches it, bundled
/// so `close` can stop the sweeper before dropping the adapter. Held as
/// `Arc<dyn MediaEnginePort>` (port B), not the concrete
/// `MediasoupAdapter`, so the application layer never depends on the
/// concrete engine and a test double can stand in for it.
pub struct RoomMedia {
    pub adapter: Arc<dyn MediaEnginePort>,
    sweeper: tokio::task::JoinHandle<()>,
    worker_id: mediasoup::worker::WorkerId,
}

impl RoomMedia {
    /// Creates a router on the least-loaded worker and wraps it in a fresh
    /// adapter with its own orphan sweeper .
    pub async fn create(
        worker_pool: &WorkerPool,
        engine_settings: &EngineSettings,
        adapter_settings: &AdapterSettings,
    ) -> Result<Self, DomainError> {
        let worker = worker_pool.least_loaded();
        let worker_id = worker.id();

        let router = worker
        .create_router(RouterOptions::new(media_codecs()))
        .await
        .map_err(|e| DomainError::new(ErrorKind::MediaError, format!("failed to create router: {e}")))?;

        let adapter = Arc::new(MediasoupAdapter::new(
                router,
                engine_settings,
                Duration::from_secs(adapter_settings.close_timeout_secs),
        ));

        let sweeper = if adapter_settings.enable_auto_cleanup {
            spawn_orphan_sweeper(
                adapter.clone(),
                Duration::from_millis(adapter_settings.cleanup_interval_ms),
                Duration::from_secs(adapter_settings.resource_max_age_secs),
            )
        } else {
            tokio::spawn(std::future::pending::<()>())
        };

        Ok(Self {
                adapter: adapter as Arc<dyn MediaEnginePort>,
                sweeper,
                worker_id,
        })
    }

    /// Releases the router's placement on the worker pool and stops the
    /// sweeper. The underlying mediasoup router is dropped (and with it,
    /// every transport/producer/consumer) when the caller drops this value.
    pub fn close(self, worker_pool: &WorkerPool) {
        self.sweeper.abort();
        worker_pool.release(self.worker_id);
    }
}
