use std::collections::HashSet;
use std::time::Instant;

use dashmap::DashMap;
use mediasoup::consumer::{Consumer, ConsumerId};
use mediasoup::data_consumer::{DataConsumer, DataConsumerId};
use mediasoup::data_producer::{DataProducer, DataProducerId};
use mediasoup::producer::{Producer, ProducerId};
use mediasoup::transport::TransportId;
use mediasoup::webrtc_transport::WebRtcTransport;

struct Owned<T> {
    handle: T,
    created_at: Instant,
}

/// The five ownership maps plus four transport->children reverse indices
/// that requires of the adapter: one lock (DashMap shard) per
/// resource category, never nested, so cascade-close can walk categories in
/// a fixed order without risking deadlock.
#[derive(Default)]
pub struct OwnershipMaps {
    transports: DashMap<TransportId, Owned<WebRtcTransport>>,
    producers: DashMap<ProducerId, Owned<Producer>>,
    consumers: DashMap<ConsumerId, Owned<Consumer>>,
    data_producers: DashMap<DataProducerId, Owned<DataProducer>>,
    data_consumers: DashMap<DataConsumerId, Owned<DataConsumer>>,

    transport_producers: DashMap<TransportId, HashSet<ProducerId>>,
    transport_consumers: DashMap<TransportId, HashSet<ConsumerId>>,
    transport_data_producers: DashMap<TransportId, HashSet<DataProducerId>>,
    transport_data_consumers: DashMap<TransportId, HashSet<DataConsumerId>>,
}

impl OwnershipMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_transport(&self, transport: WebRtcTransport) {
        let id = transport.id();
        self.transports.insert(
            id,
            Owned {
                handle: transport,
                created_at: Instant::now(),
            },
        );
        self.transport_producers.insert(id, HashSet::new());
        self.transport_consumers.insert(id, HashSet::new());
        self.transport_data_producers.insert(id, HashSet::new());
        self.transport_data_consumers.insert(id, HashSet::new());
    }

    pub fn get_transport(&self, id: &TransportId) -> Option<WebRtcTransport> {
        self.transports.get(id).map(|e| e.handle.clone())
    }

    pub fn insert_producer(&self, transport_id: TransportId, producer: Producer) {
        let id = producer.id();
        self.producers.insert(
            id,
            Owned {
                handle: producer,
                created_at: Instant::now(),
            },
        );
        if let Some(mut children) = self.transport_producers.get_mut(&transport_id) {
            children.insert(id);
        }
    }

    pub fn get_producer(&self, id: &ProducerId) -> Option<Producer> {
        self.producers.get(id).map(|e| e.handle.clone())
    }

    pub fn insert_consumer(&self, transport_id: TransportId, consumer: Consumer) {
        let id = consumer.id();
        self.consumers.insert(
            id,
            Owned {
                handle: consumer,
                created_at: Instant::now(),
            },
        );
        if let Some(mut children) = self.transport_consumers.get_mut(&transport_id) {
            children.insert(id);
        }
    }

    pub fn get_consumer(&self, id: &ConsumerId) -> Option<Consumer> {
        self.consumers.get(id).map(|e| e.handle.clone())
    }

    pub fn insert_data_producer(&self, transport_id: TransportId, data_producer: DataProducer) {
        let id = data_producer.id();
        self.data_producers.insert(
            id,
            Owned {
                handle: data_producer,
                created_at: Instant::now(),
            },
        );
        if let Some(mut children) = self.transport_data_producers.get_mut(&transport_id) {
            children.insert(id);
        }
    }

    pub fn get_data_producer(&self, id: &DataProducerId) -> Option<DataProducer> {
        self.data_producers.get(id).map(|e| e.handle.clone())
    }

    pub fn insert_data_consumer(&self, transport_id: TransportId, data_consumer: DataConsumer) {
        let id = data_consumer.id();
        self.data_consumers.insert(
            id,
            Owned {
                handle: data_consumer,
                created_at: Instant::now(),
            },
        );
        if let Some(mut children) = self.transport_data_consumers.get_mut(&transport_id) {
            children.insert(id);
        }
    }

    pub fn get_data_consumer(&self, id: &DataConsumerId) -> Option<DataConsumer> {
        self.data_consumers.get(id).map(|e| e.handle.clone())
    }

    pub fn remove_producer(&self, id: &ProducerId) {
        self.producers.remove(id);
        for mut children in self.transport_producers.iter_mut() {
            children.remove(id);
        }
    }

    pub fn remove_consumer(&self, id: &ConsumerId) {
        self.consumers.remove(id);
        for mut children in self.transport_consumers.iter_mut() {
            children.remove(id);
        }
    }

    pub fn remove_data_producer(&self, id: &DataProducerId) {
        self.data_producers.remove(id);
        for mut children in self.transport_data_producers.iter_mut() {
            children.remove(id);
        }
    }

    pub fn remove_data_consumer(&self, id: &DataConsumerId) {
        self.data_consumers.remove(id);
        for mut children in self.transport_data_consumers.iter_mut() {
            children.remove(id);
        }
    }

    /// Drains and returns the child ids of a transport, in cascade order,
    /// then removes the transport's own bookkeeping entries.
    pub fn take_children(
        &self,
        transport_id: &TransportId,
    ) -> (
        Vec<ProducerId>,
        Vec<ConsumerId>,
        Vec<DataProducerId>,
        Vec<DataConsumerId>,
    ) {
        let producers = self
        .transport_producers
        .remove(transport_id)
        .map(|(_, set)| set.into_iter().collect())
        .unwrap_or_default();
        let consumers = self
        .transport_consumers
        .remove(transport_id)
        .map(|(_, set)| set.into_iter().collect())
        .unwrap_or_default();
        let data_producers = self
        .transport_data_producers
        .remove(transport_id)
        .map(|(_, set)| set.into_iter().collect())
        .unwrap_or_default();
        let data_consumers = self
        .transport_data_consumers
        .remove(transport_id)
        .map(|(_, set)| set.into_iter().collect())
        .unwrap_or_default();
        (producers, consumers, data_producers, data_consumers)
    }

    pub fn remove_transport(&self, id: &TransportId) {
        self.transports.remove(id);
    }

    /// Transports with an empty child set and `age > max_age`, for the
    /// orphan sweeper .
    pub fn stale_empty_transports(&self, max_age: std::time::Duration) -> Vec<TransportId> {
        self.transports
        .iter()
        .filter(|e| {
                e.created_at.elapsed() > max_age
                && self
                .transport_producers
                .get(e.key())
                .map(|s| s.is_empty())
                .unwrap_or(true)
                && self
                .transport_consumers
                .get(e.key())
                .map(|s| s.is_empty())
                .unwrap_or(true)
                && self
                .transport_data_producers
                .get(e.key())
                .map(|s| s.is_empty())
                .unwrap_or(true)
                && self
                .transport_data_consumers
                .get(e.key())
                .map(|s| s.is_empty())
                .unwrap_or(true)
        })
        .map(|e| *e.key())
        .collect()
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    fn is_referenced<K: Eq + std::hash::Hash>(
        sets: &DashMap<TransportId, HashSet<K>>,
        id: &K,
    ) -> bool {
        sets.iter().any(|e| e.contains(id))
    }

    /// Producer ids older than `max_age` with no owning transport-child-set
    /// entry (orphan sweeper, applied per resource category).
    pub fn stale_producers(&self, max_age: std::time::Duration) -> Vec<ProducerId> {
        self.producers
        .iter()
        .filter(|e| {
                e.created_at.elapsed() > max_age
                && !Self::is_referenced(&self.transport_producers, e.key())
        })
        .map(|e| *e.key())
        .collect()
    }

    pub fn stale_consumers(&self, max_age: std::time::Duration) -> Vec<ConsumerId> {
        self.consumers
        .iter()
        .filter(|e| {
                e.created_at.elapsed() > max_age
                && !Self::is_referenced(&self.transport_consumers, e.key())
        })
        .map(|e| *e.key())
        .collect()
    }

    pub fn stale_data_producers(&self, max_age: std::time::Duration) -> Vec<DataProducerId> {
        self.data_producers
        .iter()
        .filter(|e| {
                e.created_at.elapsed() > max_age
                && !Self::is_referenced(&self.transport_data_producers, e.key())
        })
        .map(|e| *e.key())
        .collect()
    }

    pub fn stale_data_consumers(&self, max_age: std::time::Duration) -> Vec<DataConsumerId> {
        self.data_consumers
        .iter()
        .filter(|e| {
                e.created_at.elapsed() > max_age
                && !Self::is_referenced(&self.transport_data_consumers, e.key())
        })
        .map(|e| *e.key())
        .collect()
    }
}
