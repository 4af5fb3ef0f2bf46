use std::sync::Arc;
use std::time::Duration;

use crate::adapter::MediasoupAdapter;
use crate::port::MediaEnginePort;

/// Periodically evicts resources that have outlived `max_age` and are no
/// longer referenced by any transport's child set (orphan
/// sweeper: interval `T_sweep`, age threshold `T_maxAge`). Runs for the
/// lifetime of a single room's adapter; the caller aborts the returned
/// handle when the room closes.
pub fn spawn_orphan_sweeper(
    adapter: Arc<MediasoupAdapter>,
    sweep_interval: Duration,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                sweep_once(&adapter, max_age).await;
            }
    })
}

async fn sweep_once(adapter: &MediasoupAdapter, max_age: Duration) {
    let maps = adapter.ownership();

    for id in maps.stale_producers(max_age) {
        tracing::warn!(producer_id = %id, "sweeping orphaned producer");
        let _ = adapter.close_producer(id).await;
    }
    for id in maps.stale_consumers(max_age) {
        tracing::warn!(consumer_id = %id, "sweeping orphaned consumer");
        let _ = adapter.close_consumer(id).await;
    }
    for id in maps.stale_data_producers(max_age) {
        tracing::warn!(data_producer_id = %id, "sweeping orphaned data producer");
        let _ = adapter.close_data_producer(id).await;
    }
    for id in maps.stale_data_consumers(max_age) {
        tracing::warn!(data_consumer_id = %id, "sweeping orphaned data consumer");
        let _ = adapter.close_data_consumer(id).await;
    }
    for id in maps.stale_empty_transports(max_age) {
        tracing::warn!(transport_id = %id, "sweeping orphaned empty transport");
        let _ = adapter.close_transport(id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::OwnershipMaps;

    #[test]
    fn empty_maps_report_nothing_stale() {
        let maps = OwnershipMaps::new();
        assert!(maps.stale_producers(Duration::from_secs(0)).is_empty());
        assert!(maps.stale_empty_transports(Duration::from_secs(0)).is_empty());
    }
}
