use std::sync::Arc;

use parking_lot::RwLock;
use sfunet_domain::{ParticipantSid, Room};

use crate::state::AppState;
use crate::ws::connection::Conn;

/// The room this connection has joined, if any.
pub fn current_room(state: &AppState, conn: &Conn) -> Option<Arc<RwLock<Room>>> {
    state.room_manager.get_room(conn.room_sid()?)
}

/// Convenience bundle for handlers that need both the room and the acting
/// participant's sid — every handler past `joinRoom` needs this pair.
pub fn current_room_and_participant(state: &AppState, conn: &Conn) -> Option<(Arc<RwLock<Room>>, ParticipantSid)> {
    let room = current_room(state, conn)?;
    let participant_sid = conn.participant_sid()?.clone();
    Some((room, participant_sid))
}
