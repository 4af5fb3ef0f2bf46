use std::collections::HashMap;

use async_trait::async_trait;
use sfunet_domain::{ClientIntent, ErrorKind, ServerEvent};

use crate::state::AppState;
use crate::ws::connection::Conn;
use crate::ws::handlers;

/// A registered intent handler ("handler registry": a table from
/// intent-type string to a handler object, exactly one registration per
/// type). Boxed as a trait object so `HandlerRegistry` can hold all ~18 of
/// them behind a single map without an enum match duplicating what the
/// wire-tag dispatch in `ClientIntent` already does.
#[async_trait]
trait IntentHandler: Send + Sync {
    async fn handle(&self, state: &AppState, conn: &mut Conn, intent: ClientIntent);
}

macro_rules! intent_handler {
    ($name:ident, |$state:ident, $conn:ident, $intent:pat| $body:expr) => {
        struct $name;
        #[async_trait]
        impl IntentHandler for $name {
            async fn handle(&self, $state: &AppState, $conn: &mut Conn, intent: ClientIntent) {
                let $intent = intent else { unreachable!("registry key matched the wrong variant") };
                $body
            }
        }
    };
}

intent_handler!(JoinRoomHandler, |state, conn, ClientIntent::JoinRoom { room, token, metadata }| {
        handlers::join_room(state, conn, room, token, metadata).await
});
intent_handler!(LeaveRoomHandler, |state, conn, ClientIntent::LeaveRoom {}| {
        handlers::leave_room(state, conn).await
});
intent_handler!(StartCallHandler, |state, conn, ClientIntent::StartCall { target_user_id, metadata }| {
        handlers::start_call(state, conn, target_user_id, metadata).await
});
intent_handler!(AcceptCallHandler, |state, conn, ClientIntent::AcceptCall { call_id }| {
        handlers::accept_call(state, conn, call_id).await
});
intent_handler!(RejectCallHandler, |state, conn, ClientIntent::RejectCall { call_id, reason }| {
        handlers::reject_call(state, conn, call_id, reason).await
});
intent_handler!(EndCallHandler, |state, conn, ClientIntent::EndCall { call_id, reason }| {
        handlers::end_call(state, conn, call_id, reason).await
});
intent_handler!(CreateTransportHandler, |state, conn, ClientIntent::CreateTransport { direction }| {
        handlers::create_transport(state, conn, direction).await
});
intent_handler!(ConnectTransportHandler, |state, conn, ClientIntent::ConnectTransport { transport_id, dtls_parameters }| {
        handlers::connect_transport(state, conn, transport_id, dtls_parameters).await
});
intent_handler!(
    EnableCameraHandler,
    |state, conn, ClientIntent::EnableCamera { rtp_parameters, width, height, simulcast }| {
        handlers::enable_camera(state, conn, rtp_parameters, width, height, simulcast).await
    }
);
intent_handler!(EnableMicrophoneHandler, |state, conn, ClientIntent::EnableMicrophone { rtp_parameters }| {
        handlers::enable_microphone(state, conn, rtp_parameters).await
});
intent_handler!(DisableCameraHandler, |state, conn, ClientIntent::DisableCamera {}| {
        handlers::disable_camera(state, conn).await
});
intent_handler!(DisableMicrophoneHandler, |state, conn, ClientIntent::DisableMicrophone {}| {
        handlers::disable_microphone(state, conn).await
});
intent_handler!(MuteTrackHandler, |state, conn, ClientIntent::MuteTrack { track_sid }| {
        handlers::mute_track(state, conn, track_sid).await
});
intent_handler!(UnmuteTrackHandler, |state, conn, ClientIntent::UnmuteTrack { track_sid }| {
        handlers::unmute_track(state, conn, track_sid).await
});
intent_handler!(
    SubscribeToParticipantHandler,
    |state, conn, ClientIntent::SubscribeToParticipant { participant_sid, rtp_capabilities }| {
        handlers::subscribe_to_participant(state, conn, participant_sid, rtp_capabilities).await
    }
);
intent_handler!(
    UnsubscribeFromParticipantHandler,
    |state, conn, ClientIntent::UnsubscribeFromParticipant { participant_sid }| {
        handlers::unsubscribe_from_participant(state, conn, participant_sid).await
    }
);
intent_handler!(SendDataHandler, |state, conn, ClientIntent::SendData { payload, kind }| {
        handlers::send_data(state, conn, payload, kind).await
});
intent_handler!(PingHandler, |_state, conn, ClientIntent::Ping {}| {
        handlers::ping(conn).await
});

/// Table from `ClientIntent::type_name()` to the handler that serves it.
/// Built once at startup; dispatch is then a single lookup, no control flow
/// specific to any one intent type living outside its own handler function.
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Box<dyn IntentHandler>>,
}

impl HandlerRegistry {
    pub fn build() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn IntentHandler>> = HashMap::new();
        handlers.insert("joinRoom", Box::new(JoinRoomHandler));
        handlers.insert("leaveRoom", Box::new(LeaveRoomHandler));
        handlers.insert("startCall", Box::new(StartCallHandler));
        handlers.insert("acceptCall", Box::new(AcceptCallHandler));
        handlers.insert("rejectCall", Box::new(RejectCallHandler));
        handlers.insert("endCall", Box::new(EndCallHandler));
        handlers.insert("createTransport", Box::new(CreateTransportHandler));
        handlers.insert("connectTransport", Box::new(ConnectTransportHandler));
        handlers.insert("enableCamera", Box::new(EnableCameraHandler));
        handlers.insert("enableMicrophone", Box::new(EnableMicrophoneHandler));
        handlers.insert("disableCamera", Box::new(DisableCameraHandler));
        handlers.insert("disableMicrophone", Box::new(DisableMicrophoneHandler));
        handlers.insert("muteTrack", Box::new(MuteTrackHandler));
        handlers.insert("unmuteTrack", Box::new(UnmuteTrackHandler));
        handlers.insert("subscribeToParticipant", Box::new(SubscribeToParticipantHandler));
        handlers.insert("unsubscribeFromParticipant", Box::new(UnsubscribeFromParticipantHandler));
        handlers.insert("sendData", Box::new(SendDataHandler));
        handlers.insert("ping", Box::new(PingHandler));
        Self { handlers }
    }

    /// Looks up and runs the handler for `intent`. Intents with an
    /// unrecognized `type` never reach here — they fail to deserialize into
    /// `ClientIntent` first — but the fallback is kept so the registry's own
    /// contract ("unrecognized types emit invalidRequest") holds regardless.
    pub async fn dispatch(&self, state: &AppState, conn: &mut Conn, intent: ClientIntent) {
        let type_name = intent.type_name();
        match self.handlers.get(type_name) {
            Some(handler) => handler.handle(state, conn, intent).await,
            None => conn.send(&ServerEvent::error(ErrorKind::InvalidRequest, format!("unrecognized intent type: {type_name}"))),
        }
    }
}
