//! Client-side mirror of the signaling/session contract (,
//! component O): a `SignalingClient` for the wire transport, a pure
//! `reconciliation` module for post-reconnect diffing, a `ClientMediaAdapter`
//! seam for whatever concrete RTC engine binding the host application wires
//! in, and `ClientSession` tying all three to the shared `sfunet_domain`
//! session state machine.

pub mod error;
pub mod media_adapter;
pub mod reconciliation;
pub mod session;
pub mod signaling;

pub use error::{ClientError, ClientResult};
pub use media_adapter::{
    ClientMediaAdapter, DataChannelProvider, LocalConsumerParams, LocalProducerParams, LocalTransportParams,
    NeverReadyProvider, NullMediaAdapter,
};
pub use reconciliation::{ParticipantSnapshot, ReconciliationPolicy, ReconciliationReport, RoomSnapshot, TrackKey};
pub use session::{ClientSession, ReconnectPolicy};
pub use signaling::{EventListener, SignalingClient};
