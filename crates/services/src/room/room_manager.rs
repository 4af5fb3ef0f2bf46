use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use sfunet_domain::{ErrorKind, OpOutcome, Participant, ParticipantSid, Room, RoomSid, SidGenerator};

/// Application service wrapping the `Room` domain model (`G`).
/// Holds the room-level lock mandated by: every mutation on a room
/// acquires this `RwLock` before touching participants or calls, and never
/// holds it across an adapter call — callers take the lock, do the pure
/// domain mutation, and release it before awaiting anything.
pub struct RoomManager {
    rooms: DashMap<RoomSid, Arc<RwLock<Room>>>,
    names: DashMap<String, RoomSid>,
    /// Global identity -> (room, participant) index , maintained
    /// under the owning room's lock. A later join under a different room
    /// simply overwrites the previous entry.
    identity_index: DashMap<String, (RoomSid, ParticipantSid)>,
    max_rooms: Option<usize>,
    sid_gen: Box<dyn SidGenerator>,
}

impl RoomManager {
    pub fn new(max_rooms: Option<usize>, sid_gen: Box<dyn SidGenerator>) -> Self {
        Self {
            rooms: DashMap::new(),
            names: DashMap::new(),
            identity_index: DashMap::new(),
            max_rooms,
            sid_gen,
        }
    }

    pub fn create_room(
        &self,
        name: String,
        metadata: Option<serde_json::Value>,
        max_participants: Option<u32>,
    ) -> OpOutcome<Arc<RwLock<Room>>> {
        if !sfunet_domain::is_valid_room_name(&name) {
            return OpOutcome::err(ErrorKind::InvalidRequest, "invalid room name");
        }
        if let Some(cap) = self.max_rooms {
            if self.rooms.len() >= cap {
                return OpOutcome::err(ErrorKind::InvalidRequest, "room capacity exhausted");
            }
        }
        if self.names.contains_key(&name) {
            let sid = self.names.get(&name).unwrap().clone();
            let room = self.rooms.get(&sid).unwrap().clone();
            return OpOutcome::ok(room);
        }

        let sid = RoomSid::from(self.sid_gen.generate("RM_"));
        let now = chrono::Utc::now().timestamp();
        let room = Arc::new(RwLock::new(Room::new(
                    sid.clone(),
                    name.clone(),
                    metadata,
                    max_participants,
                    now,
        )));
        self.rooms.insert(sid.clone(), room.clone());
        self.names.insert(name, sid);
        OpOutcome::ok(room)
    }

    pub fn get_room(&self, sid: &RoomSid) -> Option<Arc<RwLock<Room>>> {
        self.rooms.get(sid).map(|r| r.clone())
    }

    pub fn get_room_by_name(&self, name: &str) -> Option<Arc<RwLock<Room>>> {
        let sid = self.names.get(name)?.clone();
        self.get_room(&sid)
    }

    /// Removes a room from the registry. The caller is responsible for
    /// tearing down the room's media adapter before or after this call;
    /// `RoomManager` only owns domain state.
    pub fn close_room(&self, sid: &RoomSid) -> bool {
        if let Some((_, room)) = self.rooms.remove(sid) {
            let room = room.read();
            self.names.remove(&room.name);
            for identity in room.participants().map(|p| p.identity.clone()).collect::<Vec<_>>() {
                self.identity_index.remove(&identity);
            }
            true
        } else {
            false
        }
    }

    pub fn close_all(&self) {
        let sids: Vec<RoomSid> = self.rooms.iter().map(|e| e.key().clone()).collect();
        for sid in sids {
            self.close_room(&sid);
        }
    }

    pub fn get_participant_by_identity(&self, identity: &str) -> Option<(RoomSid, ParticipantSid)> {
        self.identity_index.get(identity).map(|e| e.clone())
    }

    /// Adds a participant to `room`, updating the global identity index
    /// under the same critical section as the room mutation (:
    /// "global identity-index is updated under the Room lock that owns the
    /// participant").
    pub fn add_participant(
        &self,
        room: &Arc<RwLock<Room>>,
        participant: Participant,
    ) -> OpOutcome<()> {
        let mut guard = room.write();
        let sid = guard.sid.clone();
        let participant_sid = participant.sid.clone();
        let identity = participant.identity.clone();
        match guard.add_participant(participant) {
            Ok(()) => {
                self.identity_index.insert(identity, (sid, participant_sid));
                OpOutcome::ok(())
            }
            Err(e) => OpOutcome::err(e.kind, e.message),
        }
    }

    pub fn remove_participant(&self, room: &Arc<RwLock<Room>>, sid: &ParticipantSid) -> Option<Participant> {
        let mut guard = room.write();
        let participant = guard.remove_participant(sid)?;
        self.identity_index.remove(&participant.identity);
        Some(participant)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Snapshot of every currently-registered room, for background sweeps
    /// (call GC) that must see rooms created after the sweep task started.
    pub fn all_rooms(&self) -> Vec<Arc<RwLock<Room>>> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }
}
