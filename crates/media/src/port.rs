use async_trait::async_trait;
use mediasoup::consumer::ConsumerId;
use mediasoup::data_structures::DtlsParameters;
use mediasoup::producer::ProducerId;
use mediasoup::prelude::MediaKind;
use mediasoup::rtp_parameters::{RtpCapabilities, RtpParameters};
use mediasoup::sctp_parameters::SctpStreamParameters;
use mediasoup::transport::TransportId;
use sfunet_domain::DomainResult;

use crate::types::{
    ConsumerInfo, ConsumerStats, DataConsumerInfo, DataProducerInfo, Direction, ProducerInfo,
    ProducerStats, TransportInfo,
};

/// The Media-Engine Port : the operations a room's media adapter
/// exposes to application services, independent of the concrete engine.
/// Every close operation is idempotent — closing an already-closed or
/// unknown id is not an error.
#[async_trait]
pub trait MediaEnginePort: Send + Sync {
    async fn create_transport(&self, direction: Direction) -> DomainResult<TransportInfo>;
    async fn connect_transport(&self, id: TransportId, dtls_parameters: DtlsParameters) -> DomainResult<()>;
    async fn create_producer(
        &self,
        transport_id: TransportId,
        kind: MediaKind,
        source: String,
        rtp_parameters: RtpParameters,
    ) -> DomainResult<ProducerInfo>;
    async fn pause_producer(&self, id: ProducerId) -> DomainResult<()>;
    async fn resume_producer(&self, id: ProducerId) -> DomainResult<()>;
    async fn close_producer(&self, id: ProducerId) -> DomainResult<()>;
    async fn create_consumer(
        &self,
        transport_id: TransportId,
        producer_id: ProducerId,
        rtp_capabilities: &RtpCapabilities,
    ) -> DomainResult<ConsumerInfo>;
    async fn pause_consumer(&self, id: ConsumerId) -> DomainResult<()>;
    async fn resume_consumer(&self, id: ConsumerId) -> DomainResult<()>;
    async fn close_consumer(&self, id: ConsumerId) -> DomainResult<()>;
    async fn create_data_producer(
        &self,
        transport_id: TransportId,
        stream_parameters: SctpStreamParameters,
        label: String,
        protocol: String,
    ) -> DomainResult<DataProducerInfo>;
    async fn create_data_consumer(
        &self,
        transport_id: TransportId,
        data_producer_id: mediasoup::data_producer::DataProducerId,
    ) -> DomainResult<DataConsumerInfo>;
    async fn close_data_producer(&self, id: mediasoup::data_producer::DataProducerId) -> DomainResult<()>;
    async fn close_data_consumer(&self, id: mediasoup::data_consumer::DataConsumerId) -> DomainResult<()>;
    /// Cascades through producers -> consumers -> data-producers ->
    /// data-consumers in that order , then closes the transport.
    async fn close_transport(&self, id: TransportId) -> DomainResult<()>;
    /// Closes every resource owned by this adapter (room teardown).
    async fn close(&self);
    fn rtp_capabilities(&self) -> serde_json::Value;
    async fn producer_stats(&self, id: ProducerId) -> DomainResult<ProducerStats>;
    async fn consumer_stats(&self, id: ConsumerId) -> DomainResult<ConsumerStats>;
}
