use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use mediasoup::consumer::{ConsumerId, ConsumerOptions};
use mediasoup::data_consumer::{DataConsumerId, DataConsumerOptions};
use mediasoup::data_producer::{DataProducerId, DataProducerOptions};
use mediasoup::data_structures::DtlsParameters;
use mediasoup::prelude::MediaKind;
use mediasoup::producer::{ProducerId, ProducerOptions};
use mediasoup::router::Router;
use mediasoup::rtp_parameters::{RtpCapabilities, RtpParameters};
use mediasoup::sctp_parameters::SctpStreamParameters;
use mediasoup::transport::{Transport, TransportId};
use mediasoup::webrtc_transport::{
    WebRtcTransportListenInfos, WebRtcTransportOptions, WebRtcTransportRemoteParameters,
};
use mediasoup::{data_structures::ListenInfo, transport::Protocol};
use sfunet_config::EngineSettings;
use sfunet_domain::{DomainError, DomainResult, ErrorKind};
use sfunet_resilience::with_timeout;

use crate::ownership::OwnershipMaps;
use crate::port::MediaEnginePort;
use crate::types::{
    ConsumerInfo, ConsumerStats, DataConsumerInfo, DataProducerInfo, Direction, ProducerInfo,
    ProducerStats, TransportInfo,
};

fn mediasoup_err(context: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorKind::MediaError, format!("{context}: {err}"))
}

/// Concrete Media-Engine Adapter wrapping a single mediasoup
/// Router. One instance per room; the core (not mediasoup's own Router
/// bookkeeping) owns the cascade-close ordering and orphan sweep so that a
/// `closeTransport` walks producers -> consumers -> data-producers ->
/// data-consumers under an explicit, timeout-bounded schedule.
pub struct MediasoupAdapter {
    router: Router,
    maps: OwnershipMaps,
    listen_ips: Vec<IpAddr>,
    announced_ip: Option<String>,
    enable_udp: bool,
    enable_tcp: bool,
    prefer_udp: bool,
    close_timeout: Duration,
}

impl MediasoupAdapter {
    pub fn new(router: Router, settings: &EngineSettings, close_timeout: Duration) -> Self {
        let listen_ips = settings
            .listen_ips
            .iter()
            .filter_map(|s| s.parse::<IpAddr>().ok())
            .collect::<Vec<_>>();
        let listen_ips = if listen_ips.is_empty() {
            vec!["0.0.0.0".parse::<IpAddr>().unwrap()]
        } else {
            listen_ips
        };

        Self {
            router,
            maps: OwnershipMaps::new(),
            listen_ips,
            announced_ip: settings.announced_ip.clone(),
            enable_udp: settings.enable_udp,
            enable_tcp: settings.enable_tcp,
            prefer_udp: settings.prefer_udp,
            close_timeout,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn ownership(&self) -> &OwnershipMaps {
        &self.maps
    }

    fn listen_infos(&self) -> WebRtcTransportListenInfos {
        let mut infos = self.listen_ips.iter().flat_map(|ip| {
                let mut variants = Vec::new();
                if self.enable_udp {
                    variants.push(ListenInfo {
                            protocol: Protocol::Udp,
                            ip: *ip,
                            announced_address: self.announced_ip.clone(),
                            port: None,
                            port_range: None,
                            flags: None,
                            send_buffer_size: None,
                            recv_buffer_size: None,
                            expose_internal_ip: false,
                    });
                }
                if self.enable_tcp {
                    variants.push(ListenInfo {
                            protocol: Protocol::Tcp,
                            ip: *ip,
                            announced_address: self.announced_ip.clone(),
                            port: None,
                            port_range: None,
                            flags: None,
                            send_buffer_size: None,
                            recv_buffer_size: None,
                            expose_internal_ip: false,
                    });
                }
                variants
        });

        let first = infos.next().expect("at least one listen variant enabled");
        let mut listen_infos = WebRtcTransportListenInfos::new(first);
        for info in infos {
            listen_infos = listen_infos.insert(info);
        }
        listen_infos
    }
}

#[async_trait]
impl MediaEnginePort for MediasoupAdapter {
    async fn create_transport(&self, direction: Direction) -> DomainResult<TransportInfo> {
        let mut options = WebRtcTransportOptions::new(self.listen_infos());
        options.enable_udp = self.enable_udp;
        options.enable_tcp = self.enable_tcp;
        options.prefer_udp = self.prefer_udp;
        options.enable_sctp = true;

        let transport = with_timeout(
            "createTransport",
            self.close_timeout,
            self.router.create_webrtc_transport(options),
        )
        .await?
        .map_err(|e| mediasoup_err("createTransport", e))?;

        let info = TransportInfo {
            id: transport.id().to_string(),
            ice_parameters: serde_json::to_value(transport.ice_parameters).unwrap_or_default(),
            ice_candidates: serde_json::to_value(transport.ice_candidates).unwrap_or_default(),
            dtls_parameters: serde_json::to_value(transport.dtls_parameters).unwrap_or_default(),
            sctp_parameters: transport
            .sctp_parameters
            .and_then(|p| serde_json::to_value(p).ok()),
        };

        tracing::debug!(transport_id = %transport.id(), ?direction, "transport created");
        self.maps.insert_transport(transport);
        Ok(info)
    }

    async fn connect_transport(&self, id: TransportId, dtls_parameters: DtlsParameters) -> DomainResult<()> {
        let transport = self
        .maps
        .get_transport(&id)
        .ok_or_else(|| DomainError::not_found("transport not found"))?;

        with_timeout(
            "connectTransport",
            self.close_timeout,
            transport.connect(WebRtcTransportRemoteParameters { dtls_parameters }),
        )
        .await?
        .map_err(|e| mediasoup_err("connectTransport", e))
    }

    async fn create_producer(
        &self,
        transport_id: TransportId,
        kind: MediaKind,
        source: String,
        rtp_parameters: RtpParameters,
    ) -> DomainResult<ProducerInfo> {
        let transport = self
        .maps
        .get_transport(&transport_id)
        .ok_or_else(|| DomainError::not_found("transport not found"))?;

        let producer = with_timeout(
            "createProducer",
            self.close_timeout,
            transport.produce(ProducerOptions::new(kind, rtp_parameters)),
        )
        .await?
        .map_err(|e| mediasoup_err("createProducer", e))?;

        let info = ProducerInfo {
            id: producer.id().to_string(),
            kind: kind_str(kind),
            source: source.clone(),
        };
        tracing::debug!(producer_id = %producer.id(), %source, "producer created");
        self.maps.insert_producer(transport_id, producer);
        Ok(info)
    }

    async fn pause_producer(&self, id: ProducerId) -> DomainResult<()> {
        match self.maps.get_producer(&id) {
            Some(p) => with_timeout("pauseProducer", self.close_timeout, p.pause())
            .await?
            .map_err(|e| mediasoup_err("pauseProducer", e)),
            None => Ok(()),
        }
    }

    async fn resume_producer(&self, id: ProducerId) -> DomainResult<()> {
        match self.maps.get_producer(&id) {
            Some(p) => with_timeout("resumeProducer", self.close_timeout, p.resume())
            .await?
            .map_err(|e| mediasoup_err("resumeProducer", e)),
            None => Ok(()),
        }
    }

    async fn close_producer(&self, id: ProducerId) -> DomainResult<()> {
        if let Some(producer) = self.maps.get_producer(&id) {
            drop(producer);
        }
        self.maps.remove_producer(&id);
        Ok(())
    }

    async fn create_consumer(
        &self,
        transport_id: TransportId,
        producer_id: ProducerId,
        rtp_capabilities: &RtpCapabilities,
    ) -> DomainResult<ConsumerInfo> {
        if !self.router.can_consume(&producer_id, rtp_capabilities) {
            return Err(DomainError::new(
                    ErrorKind::MediaError,
                    "codec-mismatch",
            ));
        }

        let transport = self
        .maps
        .get_transport(&transport_id)
        .ok_or_else(|| DomainError::not_found("transport not found"))?;

        let consumer = with_timeout(
            "createConsumer",
            self.close_timeout,
            transport.consume(ConsumerOptions::new(producer_id, rtp_capabilities.clone())),
        )
        .await?
        .map_err(|e| mediasoup_err("createConsumer", e))?;

        let info = ConsumerInfo {
            id: consumer.id().to_string(),
            producer_id: consumer.producer_id.to_string(),
            kind: kind_str(consumer.kind),
            rtp_parameters: serde_json::to_value(consumer.rtp_parameters).unwrap_or_default(),
        };
        tracing::debug!(consumer_id = %consumer.id(), %producer_id, "consumer created");
        self.maps.insert_consumer(transport_id, consumer);
        Ok(info)
    }

    async fn pause_consumer(&self, id: ConsumerId) -> DomainResult<()> {
        match self.maps.get_consumer(&id) {
            Some(c) => with_timeout("pauseConsumer", self.close_timeout, c.pause())
            .await?
            .map_err(|e| mediasoup_err("pauseConsumer", e)),
            None => Ok(()),
        }
    }

    async fn resume_consumer(&self, id: ConsumerId) -> DomainResult<()> {
        match self.maps.get_consumer(&id) {
            Some(c) => with_timeout("resumeConsumer", self.close_timeout, c.resume())
            .await?
            .map_err(|e| mediasoup_err("resumeConsumer", e)),
            None => Ok(()),
        }
    }

    async fn close_consumer(&self, id: ConsumerId) -> DomainResult<()> {
        self.maps.remove_consumer(&id);
        Ok(())
    }

    async fn create_data_producer(
        &self,
        transport_id: TransportId,
        stream_parameters: SctpStreamParameters,
        label: String,
        protocol: String,
    ) -> DomainResult<DataProducerInfo> {
        let transport = self
        .maps
        .get_transport(&transport_id)
        .ok_or_else(|| DomainError::not_found("transport not found"))?;

        let mut options = DataProducerOptions::new_sctp(stream_parameters);
        options.label = label.clone();
        options.protocol = protocol.clone();

        let data_producer = with_timeout(
            "createDataProducer",
            self.close_timeout,
            transport.produce_data(options),
        )
        .await?
        .map_err(|e| mediasoup_err("createDataProducer", e))?;

        let info = DataProducerInfo {
            id: data_producer.id().to_string(),
            label,
            protocol,
        };
        self.maps.insert_data_producer(transport_id, data_producer);
        Ok(info)
    }

    async fn create_data_consumer(
        &self,
        transport_id: TransportId,
        data_producer_id: DataProducerId,
    ) -> DomainResult<DataConsumerInfo> {
        let transport = self
        .maps
        .get_transport(&transport_id)
        .ok_or_else(|| DomainError::not_found("transport not found"))?;

        let options = DataConsumerOptions::new_sctp(data_producer_id);
        let data_consumer = with_timeout(
            "createDataConsumer",
            self.close_timeout,
            transport.consume_data(options),
        )
        .await?
        .map_err(|e| mediasoup_err("createDataConsumer", e))?;

        let info = DataConsumerInfo {
            id: data_consumer.id().to_string(),
            data_producer_id: data_producer_id.to_string(),
            label: data_consumer.label.clone(),
            protocol: data_consumer.protocol.clone(),
        };
        self.maps.insert_data_consumer(transport_id, data_consumer);
        Ok(info)
    }

    async fn close_data_producer(&self, id: DataProducerId) -> DomainResult<()> {
        self.maps.remove_data_producer(&id);
        Ok(())
    }

    async fn close_data_consumer(&self, id: DataConsumerId) -> DomainResult<()> {
        self.maps.remove_data_consumer(&id);
        Ok(())
    }

    async fn close_transport(&self, id: TransportId) -> DomainResult<()> {
        let (producer_ids, consumer_ids, data_producer_ids, data_consumer_ids) =
        self.maps.take_children(&id);

        for pid in producer_ids {
            if let Err(e) = self.close_producer(pid).await {
                tracing::warn!(producer_id = %pid, error = %e, "failed to close producer during cascade");
            }
        }
        for cid in consumer_ids {
            if let Err(e) = self.close_consumer(cid).await {
                tracing::warn!(consumer_id = %cid, error = %e, "failed to close consumer during cascade");
            }
        }
        for dpid in data_producer_ids {
            if let Err(e) = self.close_data_producer(dpid).await {
                tracing::warn!(data_producer_id = %dpid, error = %e, "failed to close data producer during cascade");
            }
        }
        for dcid in data_consumer_ids {
            if let Err(e) = self.close_data_consumer(dcid).await {
                tracing::warn!(data_consumer_id = %dcid, error = %e, "failed to close data consumer during cascade");
            }
        }

        self.maps.remove_transport(&id);
        tracing::debug!(transport_id = %id, "transport closed");
        Ok(())
    }

    async fn close(&self) {
        for id in self.maps.stale_empty_transports(Duration::from_secs(0)) {
            let _ = self.close_transport(id).await;
        }
    }

    fn rtp_capabilities(&self) -> serde_json::Value {
        serde_json::to_value(self.router.rtp_capabilities()).unwrap_or_default()
    }

    async fn producer_stats(&self, id: ProducerId) -> DomainResult<ProducerStats> {
        let producer = self
        .maps
        .get_producer(&id)
        .ok_or_else(|| DomainError::not_found("producer not found"))?;
        let stats = with_timeout("getProducerStats", self.close_timeout, producer.get_stats())
        .await?
        .map_err(|e| mediasoup_err("getProducerStats", e))?;
        Ok(ProducerStats {
                score: None,
                bitrate: stats.first().map(|s| s.bitrate),
        })
    }

    async fn consumer_stats(&self, id: ConsumerId) -> DomainResult<ConsumerStats> {
        let consumer = self
        .maps
        .get_consumer(&id)
        .ok_or_else(|| DomainError::not_found("consumer not found"))?;
        let _stats = with_timeout("getConsumerStats", self.close_timeout, consumer.get_stats())
        .await?
        .map_err(|e| mediasoup_err("getConsumerStats", e))?;
        Ok(ConsumerStats {
                score: None,
                bitrate: None,
        })
    }
}

fn kind_str(kind: MediaKind) -> String {
    match kind {
        MediaKind::Audio => "audio".to_string(),
        MediaKind::Video => "video".to_string(),
    }
}
