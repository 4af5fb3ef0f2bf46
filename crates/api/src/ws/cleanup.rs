use std::str::FromStr;
use std::sync::Arc;

use mediasoup::transport::TransportId;
use parking_lot::RwLock;
use sfunet_domain::{Participant, ParticipantSid, Room, RoomSid, ServerEvent};

use crate::state::AppState;
use crate::ws::fanout;

/// Closes a departed participant's send/recv transports, cascading through
/// the adapter's producer -> consumer -> data-producer -> data-consumer
/// teardown order . Best-effort: a transport id that fails to
/// parse or is already gone is logged and skipped, never propagated as a
/// hard error — the participant is leaving either way.
pub async fn close_participant_media(state: &AppState, room_sid: &RoomSid, participant: &Participant) {
    let Some(adapter) = state.room_media_adapter(room_sid) else {
        return;
    };

    for transport_id in participant
    .send_transport_id
    .iter()
    .chain(participant.recv_transport_id.iter())
    {
        match TransportId::from_str(transport_id) {
            Ok(id) => {
                if let Err(e) = sfunet_media::MediaEnginePort::close_transport(adapter.as_ref(), id).await {
                    tracing::warn!(transport_id, error = %e, "failed to close transport during participant cleanup");
                }
            }
            Err(e) => {
                tracing::warn!(transport_id, error = %e, "stored transport id failed to parse");
            }
        }
    }
}

/// Drops one connection's membership in `participant_sid` (explicit
/// `leaveRoom`, or the transport loop noticing the socket died). Only the
/// last live connection for an identity triggers a full departure — a
/// second tab staying open must not evict the first ("multiple
/// connections per identity").
pub async fn handle_disconnect(
    state: &AppState,
    room: &Arc<RwLock<Room>>,
    room_sid: &RoomSid,
    participant_sid: &ParticipantSid,
    connection_id: &str,
) {
    let last_connection_closed = {
        let mut guard = room.write();
        match guard.get_participant_mut(participant_sid) {
            Some(p) => p.remove_connection(connection_id),
            None => return,
        }
    };
    if !last_connection_closed {
        return;
    }

    let Some(participant) = state.room_manager.remove_participant(room, participant_sid) else {
        return;
    };
    close_participant_media(state, room_sid, &participant).await;
    fanout::broadcast_room(
        state,
        &room.read(),
        &ServerEvent::ParticipantLeft { participant_sid: participant_sid.to_string() },
        None,
    );

    if room.read().is_empty() {
        state.close_room_media(room_sid);
        state.room_manager.close_room(room_sid);
    }
}
