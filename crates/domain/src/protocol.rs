use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::CallState;
use crate::error::ErrorKind;
use crate::participant::Participant;
use crate::track::Track;

/// The client -> server wire contract ("every intent type listed in
/// §4.9 is recognized"). Lives in the domain crate so both the server's
/// signaling transport and the client mirror (O) parse the exact same shape
/// without either depending on the other's transport stack.
///
/// `createTransport`/`connectTransport` are not named in §4.9's handler list
/// but are the wire-level realization of the "ensure transport exists" step
/// every media handler requires — see DESIGN.md for this resolved ambiguity.
/// RTP/DTLS payloads cross the wire as opaque JSON; only the media crate
/// (which depends on mediasoup) parses them into concrete types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientIntent {
    #[serde(rename = "joinRoom")]
    JoinRoom {
        room: String,
        token: String,
        #[serde(default)]
        metadata: Option<Value>,
    },
    #[serde(rename = "leaveRoom")]
    LeaveRoom {},
    #[serde(rename = "startCall")]
    StartCall {
        #[serde(rename = "targetUserId")]
        target_user_id: String,
        #[serde(default)]
        metadata: Option<Value>,
    },
    #[serde(rename = "acceptCall")]
    AcceptCall { #[serde(rename = "callId")] call_id: String },
    #[serde(rename = "rejectCall")]
    RejectCall {
        #[serde(rename = "callId")]
        call_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(rename = "endCall")]
    EndCall {
        #[serde(rename = "callId")]
        call_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(rename = "createTransport")]
    CreateTransport { direction: String },
    #[serde(rename = "connectTransport")]
    ConnectTransport {
        #[serde(rename = "transportId")]
        transport_id: String,
        #[serde(rename = "dtlsParameters")]
        dtls_parameters: Value,
    },
    #[serde(rename = "enableCamera")]
    EnableCamera {
        #[serde(rename = "rtpParameters")]
        rtp_parameters: Value,
        width: Option<u32>,
        height: Option<u32>,
        #[serde(default)]
        simulcast: bool,
    },
    #[serde(rename = "enableMicrophone")]
    EnableMicrophone {
        #[serde(rename = "rtpParameters")]
        rtp_parameters: Value,
    },
    #[serde(rename = "disableCamera")]
    DisableCamera {},
    #[serde(rename = "disableMicrophone")]
    DisableMicrophone {},
    #[serde(rename = "muteTrack")]
    MuteTrack { #[serde(rename = "trackSid")] track_sid: String },
    #[serde(rename = "unmuteTrack")]
    UnmuteTrack { #[serde(rename = "trackSid")] track_sid: String },
    #[serde(rename = "subscribeToParticipant")]
    SubscribeToParticipant {
        #[serde(rename = "participantSid")]
        participant_sid: String,
        #[serde(rename = "rtpCapabilities")]
        rtp_capabilities: Value,
    },
    #[serde(rename = "unsubscribeFromParticipant")]
    UnsubscribeFromParticipant {
        #[serde(rename = "participantSid")]
        participant_sid: String,
    },
    #[serde(rename = "sendData")]
    SendData { payload: Value, kind: DataKind },
    #[serde(rename = "ping")]
    Ping {},
}

impl ClientIntent {
    /// The wire `type` discriminant, for logging and the bad-intent counter
    /// ("repeated schema failures above N_bad").
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientIntent::JoinRoom { .. } => "joinRoom",
            ClientIntent::LeaveRoom {} => "leaveRoom",
            ClientIntent::StartCall { .. } => "startCall",
            ClientIntent::AcceptCall { .. } => "acceptCall",
            ClientIntent::RejectCall { .. } => "rejectCall",
            ClientIntent::EndCall { .. } => "endCall",
            ClientIntent::CreateTransport { .. } => "createTransport",
            ClientIntent::ConnectTransport { .. } => "connectTransport",
            ClientIntent::EnableCamera { .. } => "enableCamera",
            ClientIntent::EnableMicrophone { .. } => "enableMicrophone",
            ClientIntent::DisableCamera {} => "disableCamera",
            ClientIntent::DisableMicrophone {} => "disableMicrophone",
            ClientIntent::MuteTrack { .. } => "muteTrack",
            ClientIntent::UnmuteTrack { .. } => "unmuteTrack",
            ClientIntent::SubscribeToParticipant { .. } => "subscribeToParticipant",
            ClientIntent::UnsubscribeFromParticipant { .. } => "unsubscribeFromParticipant",
            ClientIntent::SendData { .. } => "sendData",
            ClientIntent::Ping {} => "ping",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Reliable,
    Lossy,
}

/// Wire-level view of a participant , derived from the domain
/// `Participant` but without internal bookkeeping (producer/consumer id maps).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantView {
    pub sid: String,
    pub identity: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub metadata: Option<Value>,
    pub tracks: Vec<Track>,
}

impl From<&Participant> for ParticipantView {
    fn from(p: &Participant) -> Self {
        Self {
            sid: p.sid.as_str().to_string(),
            identity: p.identity.clone(),
            display_name: p.display_name.clone(),
            metadata: p.metadata.clone(),
            tracks: p.tracks.values().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallView {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub identity: String,
}

/// The server -> client wire contract (enumerated frame types),
/// `error` included. One variant per event named in §6 plus the supplemented
/// `transportCreated`/`pong`/`connected` frames (DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected { #[serde(rename = "connectionId")] connection_id: String },
    #[serde(rename = "roomJoined")]
    RoomJoined {
        room: String,
        participant: ParticipantView,
        #[serde(rename = "otherParticipants")]
        other_participants: Vec<ParticipantView>,
        #[serde(rename = "rtpCapabilities")]
        rtp_capabilities: Value,
    },
    #[serde(rename = "participantJoined")]
    ParticipantJoined { participant: ParticipantView },
    #[serde(rename = "participantLeft")]
    ParticipantLeft { #[serde(rename = "participantSid")] participant_sid: String },
    #[serde(rename = "callStarted")]
    CallStarted { #[serde(rename = "callId")] call_id: String, target: CallView },
    #[serde(rename = "callReceived")]
    CallReceived {
        #[serde(rename = "callId")]
        call_id: String,
        caller: CallView,
        metadata: Option<Value>,
    },
    #[serde(rename = "callAccepted")]
    CallAccepted { #[serde(rename = "callId")] call_id: String },
    #[serde(rename = "callRejected")]
    CallRejected { #[serde(rename = "callId")] call_id: String, reason: Option<String> },
    #[serde(rename = "callEnded")]
    CallEnded { #[serde(rename = "callId")] call_id: String, reason: Option<String> },
    #[serde(rename = "transportCreated")]
    TransportCreated {
        #[serde(rename = "transportId")]
        transport_id: String,
        direction: String,
        #[serde(rename = "iceParameters")]
        ice_parameters: Value,
        #[serde(rename = "iceCandidates")]
        ice_candidates: Value,
        #[serde(rename = "dtlsParameters")]
        dtls_parameters: Value,
        #[serde(rename = "sctpParameters")]
        sctp_parameters: Option<Value>,
    },
    #[serde(rename = "cameraEnabled")]
    CameraEnabled { #[serde(rename = "trackSid")] track_sid: String },
    #[serde(rename = "cameraDisabled")]
    CameraDisabled {},
    #[serde(rename = "microphoneEnabled")]
    MicrophoneEnabled { #[serde(rename = "trackSid")] track_sid: String },
    #[serde(rename = "microphoneDisabled")]
    MicrophoneDisabled {},
    #[serde(rename = "trackPublished")]
    TrackPublished {
        #[serde(rename = "participantSid")]
        participant_sid: String,
        track: Track,
    },
    #[serde(rename = "trackUnpublished")]
    TrackUnpublished {
        #[serde(rename = "participantSid")]
        participant_sid: String,
        #[serde(rename = "trackSid")]
        track_sid: String,
    },
    #[serde(rename = "trackSubscribed")]
    TrackSubscribed {
        #[serde(rename = "participantSid")]
        participant_sid: String,
        track: Track,
        #[serde(rename = "consumerId")]
        consumer_id: String,
        #[serde(rename = "rtpParameters")]
        rtp_parameters: Value,
    },
    #[serde(rename = "trackUnsubscribed")]
    TrackUnsubscribed {
        #[serde(rename = "participantSid")]
        participant_sid: String,
        #[serde(rename = "trackSid")]
        track_sid: String,
    },
    #[serde(rename = "trackMuted")]
    TrackMuted {
        #[serde(rename = "participantSid")]
        participant_sid: String,
        #[serde(rename = "trackSid")]
        track_sid: String,
    },
    #[serde(rename = "trackUnmuted")]
    TrackUnmuted {
        #[serde(rename = "participantSid")]
        participant_sid: String,
        #[serde(rename = "trackSid")]
        track_sid: String,
    },
    #[serde(rename = "dataReceived")]
    DataReceived {
        #[serde(rename = "participantSid")]
        participant_sid: String,
        payload: Value,
        kind: DataKind,
    },
    #[serde(rename = "pong")]
    Pong {},
    #[serde(rename = "error")]
    Error { error: ErrorFrame },
}

/// `{code, message}` per error-frame shape. `code` falls in one of
/// the five ranges defined there (100-199 general ... 500-599 transport).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub code: u32,
    pub message: String,
}

impl ErrorFrame {
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code(),
            message: message.into(),
        }
    }
}

impl ServerEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            error: ErrorFrame::from_kind(kind, message),
        }
    }

    /// The wire `type` discriminant (mirrors `ClientIntent::type_name()`).
    /// The client mirror's signaling client keys its per-event-kind
    /// listener registry on this.
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::RoomJoined { .. } => "roomJoined",
            ServerEvent::ParticipantJoined { .. } => "participantJoined",
            ServerEvent::ParticipantLeft { .. } => "participantLeft",
            ServerEvent::CallStarted { .. } => "callStarted",
            ServerEvent::CallReceived { .. } => "callReceived",
            ServerEvent::CallAccepted { .. } => "callAccepted",
            ServerEvent::CallRejected { .. } => "callRejected",
            ServerEvent::CallEnded { .. } => "callEnded",
            ServerEvent::TransportCreated { .. } => "transportCreated",
            ServerEvent::CameraEnabled { .. } => "cameraEnabled",
            ServerEvent::CameraDisabled {} => "cameraDisabled",
            ServerEvent::MicrophoneEnabled { .. } => "microphoneEnabled",
            ServerEvent::MicrophoneDisabled {} => "microphoneDisabled",
            ServerEvent::TrackPublished { .. } => "trackPublished",
            ServerEvent::TrackUnpublished { .. } => "trackUnpublished",
            ServerEvent::TrackSubscribed { .. } => "trackSubscribed",
            ServerEvent::TrackUnsubscribed { .. } => "trackUnsubscribed",
            ServerEvent::TrackMuted { .. } => "trackMuted",
            ServerEvent::TrackUnmuted { .. } => "trackUnmuted",
            ServerEvent::DataReceived { .. } => "dataReceived",
            ServerEvent::Pong {} => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}

pub fn call_state_name(state: CallState) -> &'static str {
    match state {
        CallState::Pending => "pending",
        CallState::Accepted => "accepted",
        CallState::Rejected => "rejected",
        CallState::Ended => "ended",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_round_trips() {
        let intent = ClientIntent::JoinRoom {
            room: "alpha".into(),
            token: "tok".into(),
            metadata: None,
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["type"], "joinRoom");
        let back: ClientIntent = serde_json::from_value(json).unwrap();
        assert_eq!(back.type_name(), "joinRoom");
    }

    #[test]
    fn error_event_carries_code_range() {
        let event = ServerEvent::error(ErrorKind::RoomFull, "room is full");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"]["code"], 201);
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let value = serde_json::json!({ "type": "not-a-real-intent" });
        let result: Result<ClientIntent, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn server_event_type_name_matches_wire_tag() {
        let event = ServerEvent::CallEnded { call_id: "c1".into(), reason: None };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.type_name());
    }
}
