use std::sync::atomic::{AtomicUsize, Ordering};

use mediasoup::worker::{Worker, WorkerSettings};
use mediasoup::worker_manager::WorkerManager;
use sfunet_config::EngineSettings;
use tracing::{error, info};

struct Slot {
    worker: Worker,
    /// Number of routers currently placed on this worker. Used for
    /// least-loaded selection rather than the teacher's round-robin, since a
    /// long-lived room's router outlives any single placement decision and
    /// round-robin drifts under uneven room lifetimes.
    routers: AtomicUsize,
}

/// Pool of mediasoup workers with least-loaded router placement.
pub struct WorkerPool {
    slots: Vec<Slot>,
}

impl WorkerPool {
    pub async fn new(settings: &EngineSettings) -> anyhow::Result<Self> {
        let worker_manager = WorkerManager::new();
        let mut slots = Vec::with_capacity(settings.num_workers as usize);

        for i in 0..settings.num_workers {
            let mut worker_settings = WorkerSettings::default();
            worker_settings.rtc_port_range = settings.rtc_min_port..=settings.rtc_max_port;

            let worker = worker_manager
            .create_worker(worker_settings)
            .await
            .map_err(|e| anyhow::anyhow!("failed to create mediasoup worker {i}: {e}"))?;

            let worker_id = worker.id();
            worker
            .on_dead(move |reason| {
                    error!(?reason, %worker_id, "mediasoup worker died");
            })
            .detach();

            info!(worker_id = %worker.id(), index = i, "mediasoup worker created");
            slots.push(Slot {
                    worker,
                    routers: AtomicUsize::new(0),
            });
        }

        Ok(Self { slots })
    }

    /// Returns the worker with the fewest routers currently placed on it.
    /// Callers that place a router on the returned worker should call
    /// `release` when that router closes to keep the count accurate.
    pub fn least_loaded(&self) -> &Worker {
        let (slot, _) = self
        .slots
        .iter()
        .map(|s| (s, s.routers.load(Ordering::Relaxed)))
        .min_by_key(|(_, load)| *load)
        .expect("worker pool is never empty");
        slot.routers.fetch_add(1, Ordering::Relaxed);
        &slot.worker
    }

    /// Call when a router placed via `least_loaded` is torn down.
    pub fn release(&self, worker_id: mediasoup::worker::WorkerId) {
        if let Some(slot) = self.slots.iter().find(|s| s.worker.id() == worker_id) {
            slot.routers.fetch_sub(1, Ordering::Relaxed);
        }
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }
}
