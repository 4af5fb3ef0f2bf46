use sfunet_domain::{ParticipantSid, Room, ServerEvent};

use crate::state::AppState;

/// Broadcasts `event` to every connection of every participant currently in
/// `room`, optionally skipping one connection id (the sender, for events
/// where the actor already has local confirmation via a direct reply).
/// Takes `&Room` rather than the lock itself — callers read-lock the room,
/// collect what they need, and pass the guard's contents here, never across
/// an `.await` .
pub fn broadcast_room(state: &AppState, room: &Room, event: &ServerEvent, exclude_connection: Option<&str>) {
    let text = match serde_json::to_string(event) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize broadcast event");
            return;
        }
    };
    for participant in room.participants() {
        for connection_id in participant.connection_ids() {
            if Some(connection_id.as_str()) == exclude_connection {
                continue;
            }
            state.connections.send_or_evict(connection_id, text.clone());
        }
    }
}

/// Sends `event` to every live connection of a single participant (used for
/// call invites/decisions and cascades addressed at one identity).
pub fn send_to_participant(state: &AppState, room: &Room, participant_sid: &ParticipantSid, event: &ServerEvent) {
    let Some(participant) = room.get_participant(participant_sid) else {
        return;
    };
    let text = match serde_json::to_string(event) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize targeted event");
            return;
        }
    };
    for connection_id in participant.connection_ids() {
        state.connections.send_or_evict(connection_id, text.clone());
    }
}

pub fn send_to_connection(state: &AppState, connection_id: &str, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(text) => state.connections.send_or_evict(connection_id, text),
        Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
    }
}
