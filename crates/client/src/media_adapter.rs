use async_trait::async_trait;
use serde_json::Value;
use sfunet_domain::{DomainResult, TrackKind, TrackSource};

/// Connection parameters for one local transport, the client-side
/// counterpart of `sfunet_media::types::TransportInfo` . RTP/DTLS
/// payloads stay opaque JSON here too — only a concrete engine binding
/// parses them into real ICE/DTLS types.
#[derive(Debug, Clone)]
pub struct LocalTransportParams {
    pub transport_id: String,
    pub ice_parameters: Value,
    pub ice_candidates: Value,
    pub dtls_parameters: Value,
    pub sctp_parameters: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct LocalProducerParams {
    pub track_sid: String,
    pub rtp_parameters: Value,
}

#[derive(Debug, Clone)]
pub struct LocalConsumerParams {
    pub consumer_id: String,
    pub producer_track_sid: String,
    pub rtp_parameters: Value,
}

/// The client-side counterpart of the Media-Engine Port (,
/// component B): hides whatever concrete RTC engine binding is wired in
/// behind the same intent-level operations the signaling protocol names
/// (`createTransport`, `enableCamera`, `subscribeToParticipant`, ...). The
/// actual ICE/DTLS/SRTP stack and the React-specific binding layer are
/// external collaborators (Non-goals) — this trait is the seam a
/// real browser/native WebRTC library plugs into; the core client-side
/// library spec stops here.
#[async_trait]
pub trait ClientMediaAdapter: Send + Sync {
    async fn create_send_transport(&self) -> DomainResult<LocalTransportParams>;
    async fn create_recv_transport(&self) -> DomainResult<LocalTransportParams>;
    async fn connect_transport(&self, transport_id: &str, dtls_parameters: Value) -> DomainResult<()>;
    async fn produce(&self, transport_id: &str, kind: TrackKind, source: TrackSource) -> DomainResult<LocalProducerParams>;
    async fn close_producer(&self, track_sid: &str) -> DomainResult<()>;
    async fn consume(
        &self,
        transport_id: &str,
        producer_track_sid: &str,
        rtp_capabilities: Value,
    ) -> DomainResult<LocalConsumerParams>;
    async fn close_consumer(&self, consumer_id: &str) -> DomainResult<()>;
    fn rtp_capabilities(&self) -> Value;
}

/// Readiness gate for the WebRTC data-channel path (/// "data-channel fallback" supplement — open question resolved as
/// "both are supported"). `sendData` prefers a real data producer/consumer
/// pair when the provider is ready and falls back to the signaling-relayed
/// round trip otherwise.
pub trait DataChannelProvider: Send + Sync {
    fn is_ready(&self) -> bool;
    /// Hands `payload` to the WebRTC data channel. Only called when
    /// `is_ready` is true.
    fn send(&self, payload: &Value) -> DomainResult<()>;
}

/// The correct default absent a real binding: never ready, so every
/// `sendData` call takes the signaling-relay fallback.
pub struct NeverReadyProvider;

impl DataChannelProvider for NeverReadyProvider {
    fn is_ready(&self) -> bool {
        false
    }

    fn send(&self, _payload: &Value) -> DomainResult<()> {
        Err(sfunet_domain::DomainError::new(
                sfunet_domain::ErrorKind::MediaError,
                "data channel provider is never ready",
        ))
    }
}

/// An in-memory stand-in for a real engine binding. Exercises every
/// operation the port above names without touching an actual RTC stack —
/// used by this crate's own tests, and as the reference shape a real
/// binding (browser WASM or a native webrtc crate) would implement.
#[derive(Debug, Default)]
pub struct NullMediaAdapter;

fn fabricate_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl ClientMediaAdapter for NullMediaAdapter {
    async fn create_send_transport(&self) -> DomainResult<LocalTransportParams> {
        Ok(LocalTransportParams {
                transport_id: fabricate_id("local-send"),
                ice_parameters: Value::Null,
                ice_candidates: Value::Null,
                dtls_parameters: Value::Null,
                sctp_parameters: None,
        })
    }

    async fn create_recv_transport(&self) -> DomainResult<LocalTransportParams> {
        Ok(LocalTransportParams {
                transport_id: fabricate_id("local-recv"),
                ice_parameters: Value::Null,
                ice_candidates: Value::Null,
                dtls_parameters: Value::Null,
                sctp_parameters: None,
        })
    }

    async fn connect_transport(&self, _transport_id: &str, _dtls_parameters: Value) -> DomainResult<()> {
        Ok(())
    }

    async fn produce(&self, _transport_id: &str, _kind: TrackKind, _source: TrackSource) -> DomainResult<LocalProducerParams> {
        Ok(LocalProducerParams {
                track_sid: fabricate_id("local-track"),
                rtp_parameters: Value::Null,
        })
    }

    async fn close_producer(&self, _track_sid: &str) -> DomainResult<()> {
        Ok(())
    }

    async fn consume(
        &self,
        _transport_id: &str,
        producer_track_sid: &str,
        _rtp_capabilities: Value,
    ) -> DomainResult<LocalConsumerParams> {
        Ok(LocalConsumerParams {
                consumer_id: fabricate_id("local-consumer"),
                producer_track_sid: producer_track_sid.to_string(),
                rtp_parameters: Value::Null,
        })
    }

    async fn close_consumer(&self, _consumer_id: &str) -> DomainResult<()> {
        Ok(())
    }

    fn rtp_capabilities(&self) -> Value {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_adapter_round_trips_a_transport_and_producer() {
        let adapter = NullMediaAdapter;
        let transport = adapter.create_send_transport().await.unwrap();
        let producer = adapter
        .produce(&transport.transport_id, TrackKind::Video, TrackSource::Camera)
        .await
        .unwrap();
        assert!(adapter.close_producer(&producer.track_sid).await.is_ok());
    }

    #[test]
    fn never_ready_provider_always_falls_back() {
        assert!(!NeverReadyProvider.is_ready());
    }
}
