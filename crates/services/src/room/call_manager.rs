use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use sfunet_config::CallManagerSettings;
use sfunet_domain::{Call, CallId, CallState, ErrorKind, OpOutcome, ParticipantSid, Room, SidGenerator};

use super::room_manager::RoomManager;

/// Application service wrapping a room's call registry (`G`).
/// Calls are scoped to a single room, so every method takes the room's
/// lock the same way `RoomManager` does; no call ever spans rooms.
pub struct CallManager {
    settings: CallManagerSettings,
    sid_gen: Box<dyn SidGenerator>,
}

impl CallManager {
    pub fn new(settings: CallManagerSettings, sid_gen: Box<dyn SidGenerator>) -> Self {
        Self { settings, sid_gen }
    }

    pub fn start(
        &self,
        room: &Arc<RwLock<Room>>,
        caller_sid: ParticipantSid,
        target_sid: ParticipantSid,
        metadata: Option<serde_json::Value>,
    ) -> OpOutcome<CallId> {
        let mut guard = room.write();

        let caller_identity = match guard.get_participant(&caller_sid) {
            Some(p) => p.identity.clone(),
            None => return OpOutcome::err(ErrorKind::NotFound, "caller not found"),
        };
        let target_identity = match guard.get_participant(&target_sid) {
            Some(p) => p.identity.clone(),
            None => return OpOutcome::err(ErrorKind::NotFound, "target not found"),
        };

        if guard
        .active_call_between(&caller_identity, &target_identity)
        .is_some()
        {
            return OpOutcome::err(ErrorKind::CallAlreadyExists, "a call already exists between these participants");
        }

        if !self.settings.allow_multiple_calls
        && (guard.active_call_for_participant(&caller_sid).is_some()
            || guard.active_call_for_participant(&target_sid).is_some())
        {
            return OpOutcome::err(ErrorKind::CallAlreadyExists, "a participant already has an active call");
        }

        let call_id = CallId::from(self.sid_gen.generate("CL_"));
        let now = chrono::Utc::now().timestamp();
        let call = Call::new(call_id.clone(), caller_sid, target_sid, now, metadata);
        guard.insert_call(call, &caller_identity, &target_identity);
        OpOutcome::ok(call_id)
    }

    pub fn accept(&self, room: &Arc<RwLock<Room>>, call_id: &CallId) -> OpOutcome<()> {
        let mut guard = room.write();
        let now = chrono::Utc::now().timestamp();
        match guard.get_call_mut(call_id) {
            Some(call) if call.transition(CallState::Accepted, now) => OpOutcome::ok(()),
            Some(_) => OpOutcome::err(ErrorKind::InvalidCallState, "call cannot be accepted from its current state"),
            None => OpOutcome::err(ErrorKind::NotFound, "call not found"),
        }
    }

    pub fn reject(&self, room: &Arc<RwLock<Room>>, call_id: &CallId) -> OpOutcome<()> {
        self.end_with_state(room, call_id, CallState::Rejected)
    }

    pub fn end(&self, room: &Arc<RwLock<Room>>, call_id: &CallId) -> OpOutcome<()> {
        self.end_with_state(room, call_id, CallState::Ended)
    }

    fn end_with_state(&self, room: &Arc<RwLock<Room>>, call_id: &CallId, state: CallState) -> OpOutcome<()> {
        let mut guard = room.write();
        let now = chrono::Utc::now().timestamp();

        let (caller, target) = match guard.get_call(call_id) {
            Some(call) => (call.caller_sid.clone(), call.target_sid.clone()),
            None => return OpOutcome::err(ErrorKind::NotFound, "call not found"),
        };
        let caller_identity = guard.get_participant(&caller).map(|p| p.identity.clone());
        let target_identity = guard.get_participant(&target).map(|p| p.identity.clone());

        match guard.get_call_mut(call_id) {
            Some(call) if call.transition(state, now) => {
                if let (Some(a), Some(b)) = (caller_identity, target_identity) {
                    guard.clear_pair_index_for(&a, &b);
                }
                OpOutcome::ok(())
            }
            Some(_) => OpOutcome::err(ErrorKind::InvalidCallState, "call cannot transition from its current state"),
            None => OpOutcome::err(ErrorKind::NotFound, "call not found"),
        }
    }

    pub fn get_active_call_for_participant(&self, room: &Arc<RwLock<Room>>, sid: &ParticipantSid) -> Option<Call> {
        room.read().active_call_for_participant(sid).cloned()
    }

    pub fn get_call_between_participants(&self, room: &Arc<RwLock<Room>>, a: &str, b: &str) -> Option<Call> {
        room.read().active_call_between(a, b).cloned()
    }

    pub fn settings(&self) -> &CallManagerSettings {
        &self.settings
    }
}

/// Spawns the background GC that purges terminal calls older than
/// `cleanup_max_age_secs` every `cleanup_interval_ms` (, `T_callgc`
/// / `T_callmax`). Returns a handle the caller aborts on shutdown. Re-reads
/// the room list from `room_manager` on every tick so rooms created after
/// this task started are still swept.
pub fn spawn_call_gc(
    room_manager: Arc<RoomManager>,
    settings: CallManagerSettings,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
            if !settings.enable_auto_cleanup {
                std::future::pending::<()>().await;
                return;
            }
            let mut ticker = tokio::time::interval(Duration::from_millis(settings.cleanup_interval_ms));
            loop {
                ticker.tick().await;
                let now = chrono::Utc::now().timestamp();
                for room in room_manager.all_rooms() {
                    let removed = room.write().gc_terminal_calls(now, settings.cleanup_max_age_secs as i64);
                    if !removed.is_empty() {
                        tracing::debug!(count = removed.len(), "call GC swept terminal calls");
                    }
                }
            }
    })
}
