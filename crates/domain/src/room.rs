use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::call::{Call, CallState};
use crate::error::{DomainError, DomainResult, ErrorKind};
use crate::ids::{CallId, ParticipantSid, RoomSid};
use crate::participant::Participant;

/// A container for participants — the scope for fan-out and calls.
///
/// `Room` itself holds no lock; callers (the `RoomManager`/handlers) take
/// the room-level lock around these methods, so every method here is a
/// plain, synchronous mutation with no suspension points — no handler may
/// hold a room lock across an adapter call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub sid: RoomSid,
    pub name: String,
    pub metadata: Option<serde_json::Value>,
    pub max_participants: Option<u32>,
    pub creation_time: i64,
    pub active: bool,
    participants_by_sid: HashMap<ParticipantSid, Participant>,
    identity_index: HashMap<String, ParticipantSid>,
    calls: HashMap<CallId, Call>,
    /// unordered `{identity_a, identity_b}` -> active (non-terminal) call id.
    pair_index: HashMap<(String, String), CallId>,
}

impl Room {
    pub fn new(
        sid: RoomSid,
        name: String,
        metadata: Option<serde_json::Value>,
        max_participants: Option<u32>,
        creation_time: i64,
    ) -> Self {
        Self {
            sid,
            name,
            metadata,
            max_participants,
            creation_time,
            active: true,
            participants_by_sid: HashMap::new(),
            identity_index: HashMap::new(),
            calls: HashMap::new(),
            pair_index: HashMap::new(),
        }
    }

    pub fn num_participants(&self) -> usize {
        self.participants_by_sid.len()
    }

    pub fn is_full(&self) -> bool {
        match self.max_participants {
            Some(max) => self.num_participants() as u32 >= max,
            None => false,
        }
    }

    pub fn get_participant(&self, sid: &ParticipantSid) -> Option<&Participant> {
        self.participants_by_sid.get(sid)
    }

    pub fn get_participant_mut(&mut self, sid: &ParticipantSid) -> Option<&mut Participant> {
        self.participants_by_sid.get_mut(sid)
    }

    pub fn get_participant_by_identity(&self, identity: &str) -> Option<&Participant> {
        self.identity_index
        .get(identity)
        .and_then(|sid| self.participants_by_sid.get(sid))
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants_by_sid.values()
    }

    pub fn participant_sids(&self) -> impl Iterator<Item = &ParticipantSid> {
        self.participants_by_sid.keys()
    }

    /// Adds a participant; fails with `roomFull` if the cap is already at
    /// capacity.
    pub fn add_participant(&mut self, participant: Participant) -> DomainResult<()> {
        if self.is_full() {
            return Err(DomainError::new(ErrorKind::RoomFull, "room is full"));
        }
        self.identity_index
        .insert(participant.identity.clone(), participant.sid.clone());
        self.participants_by_sid
        .insert(participant.sid.clone(), participant);
        Ok(())
    }

    /// Removes a participant and returns it, if present.
    pub fn remove_participant(&mut self, sid: &ParticipantSid) -> Option<Participant> {
        let participant = self.participants_by_sid.remove(sid)?;
        self.identity_index.remove(&participant.identity);
        Some(participant)
    }

    pub fn is_empty(&self) -> bool {
        self.participants_by_sid.is_empty()
    }

    // ---- Call registry -------------------------------------------------

    pub fn get_call(&self, call_id: &CallId) -> Option<&Call> {
        self.calls.get(call_id)
    }

    pub fn get_call_mut(&mut self, call_id: &CallId) -> Option<&mut Call> {
        self.calls.get_mut(call_id)
    }

    /// O(1) lookup of the active (non-terminal) call between two identities,
    /// enforcing: at most one active call per pair.
    pub fn active_call_between(&self, a: &str, b: &str) -> Option<&Call> {
        let key = Self::identity_pair_key(a, b);
        self.pair_index
        .get(&key)
        .and_then(|id| self.calls.get(id))
    }

    pub fn active_call_for_participant(&self, sid: &ParticipantSid) -> Option<&Call> {
        self.calls
        .values()
        .find(|c| !c.state.is_terminal() && c.involves(sid))
    }

    pub fn insert_call(&mut self, call: Call, identity_a: &str, identity_b: &str) {
        let key = Self::identity_pair_key(identity_a, identity_b);
        self.pair_index.insert(key, call.call_id.clone());
        self.calls.insert(call.call_id.clone(), call);
    }

    /// Removes the pair-index entry once a call leaves the non-terminal
    /// states (the entry is re-derivable; terminal calls stay in `calls`
    /// for the GC sweep, but no longer block new calls).
    pub fn clear_pair_index_for(&mut self, identity_a: &str, identity_b: &str) {
        let key = Self::identity_pair_key(identity_a, identity_b);
        self.pair_index.remove(&key);
    }

    pub fn calls(&self) -> impl Iterator<Item = &Call> {
        self.calls.values()
    }

    /// Purges terminal calls older than `max_age_secs` (the call-GC sweep).
    /// Returns the removed call ids.
    pub fn gc_terminal_calls(&mut self, now: i64, max_age_secs: i64) -> Vec<CallId> {
        let stale: Vec<CallId> = self
        .calls
        .values()
        .filter(|c| {
                c.state.is_terminal()
                && c.end_time
                .map(|end| now - end >= max_age_secs)
                .unwrap_or(false)
        })
        .map(|c| c.call_id.clone())
        .collect();
        for id in &stale {
            self.calls.remove(id);
        }
        stale
    }

    fn identity_pair_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }
}

/// Validates a room name against: `^[A-Za-z0-9_-]{1,64}$`.
pub fn is_valid_room_name(name: &str) -> bool {
    let len = name.len();
    if len == 0 || len > 64 {
        return false;
    }
    name.bytes()
    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::Permissions;

    fn mk_participant(identity: &str) -> Participant {
        Participant::new(
            ParticipantSid(format!("pa_{identity}")),
            identity.to_string(),
            None,
            None,
            Permissions {
                may_publish: true,
                may_subscribe: true,
                may_publish_data: true,
            },
            format!("conn_{identity}"),
        )
    }

    #[test]
    fn room_name_regex_boundaries() {
        assert!(!is_valid_room_name(""));
        assert!(!is_valid_room_name("a/b"));
        assert!(!is_valid_room_name(&"a".repeat(65)));
        assert!(is_valid_room_name(&"a".repeat(64)));
        assert!(is_valid_room_name("Room-1_2"));
    }

    #[test]
    fn room_full_rejects_over_capacity() {
        let mut room = Room::new(RoomSid("r1".into()), "alpha".into(), None, Some(1), 0);
        room.add_participant(mk_participant("alice")).unwrap();
        let err = room.add_participant(mk_participant("bob")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RoomFull);
    }

    #[test]
    fn pair_index_is_order_independent() {
        let mut room = Room::new(RoomSid("r1".into()), "alpha".into(), None, None, 0);
        let call = Call::new(
            CallId("c1".into()),
            ParticipantSid("pa_alice".into()),
            ParticipantSid("pa_bob".into()),
            0,
            None,
        );
        room.insert_call(call, "alice", "bob");
        assert!(room.active_call_between("bob", "alice").is_some());
        assert!(room.active_call_between("alice", "bob").is_some());
    }
}
