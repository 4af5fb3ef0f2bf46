use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{ParticipantSid, TrackSid};
use crate::track::{Track, TrackKind, TrackSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Joining,
    Connected,
    Reconnecting,
    Closed,
}

/// The grants carried by a validated credential that gate handler
/// preconditions .
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Permissions {
    pub may_publish: bool,
    pub may_subscribe: bool,
    pub may_publish_data: bool,
}

/// A participant in a room: one identity's membership, independent of how
/// many signaling connections (tabs/devices) that identity currently holds
/// — see "multiple connections per identity" supplement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub sid: ParticipantSid,
    pub identity: String,
    pub display_name: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub connection_state: ConnectionState,
    pub permissions: Permissions,
    /// Every signaling connection currently representing this identity in
    /// the room ("multiple connections per identity"): most
    /// handlers act through `primary_connection_id`, but fan-out addresses
    /// every entry so a broadcast reaches every open tab/device.
    connection_ids: Vec<String>,
    pub tracks: HashMap<TrackSid, Track>,
    pub producer_ids: HashMap<TrackSid, String>,
    /// `(track sid, consumer id)` pairs keyed by the source participant sid
    /// they were created for — the track sid lets `unsubscribeFromParticipant`
    /// report which track each closed consumer belonged to.
    pub consumer_ids: HashMap<ParticipantSid, Vec<(TrackSid, String)>>,
    pub send_transport_id: Option<String>,
    pub recv_transport_id: Option<String>,
}

impl Participant {
    pub fn new(
        sid: ParticipantSid,
        identity: String,
        display_name: Option<String>,
        metadata: Option<serde_json::Value>,
        permissions: Permissions,
        connection_id: String,
    ) -> Self {
        Self {
            sid,
            identity,
            display_name,
            metadata,
            connection_state: ConnectionState::Joining,
            permissions,
            connection_ids: vec![connection_id],
            tracks: HashMap::new(),
            producer_ids: HashMap::new(),
            consumer_ids: HashMap::new(),
            send_transport_id: None,
            recv_transport_id: None,
        }
    }

    /// Finds the currently-active track for a `(source, kind)` pair, per
    /// invariant (b): at most one per pair.
    pub fn find_track_by_source(
        &self,
        source: TrackSource,
        kind: TrackKind,
    ) -> Option<&Track> {
        self.tracks
        .values()
        .find(|t| t.source == source && t.kind == kind)
    }

    /// Inserts a track, evicting and returning any prior track with the same
    /// `(source, kind)` — the "latest publish wins" replacement rule.
    pub fn publish_track(&mut self, track: Track) -> Option<Track> {
        let key = track.replacement_key();
        let stale_sid = self
        .tracks
        .values()
        .find(|t| t.replacement_key() == key)
        .map(|t| t.sid.clone());
        let stale = stale_sid.and_then(|sid| self.remove_track(&sid));
        self.tracks.insert(track.sid.clone(), track);
        stale
    }

    pub fn remove_track(&mut self, sid: &TrackSid) -> Option<Track> {
        self.producer_ids.remove(sid);
        self.tracks.remove(sid)
    }

    /// The connection a handler's `ctx` originated from is always the
    /// primary one; it's the first to have joined and still open.
    pub fn primary_connection_id(&self) -> Option<&str> {
        self.connection_ids.first().map(String::as_str())
    }

    pub fn connection_ids(&self) -> &[String] {
        &self.connection_ids
    }

    pub fn add_connection(&mut self, connection_id: String) {
        if !self.connection_ids.contains(&connection_id) {
            self.connection_ids.push(connection_id);
        }
    }

    /// Removes a connection; returns `true` if no connection remains (the
    /// identity has fully left the room, not just one tab).
    pub fn remove_connection(&mut self, connection_id: &str) -> bool {
        self.connection_ids.retain(|c| c != connection_id);
        self.connection_ids.is_empty()
    }

    pub fn add_consumer(&mut self, source: ParticipantSid, track_sid: TrackSid, consumer_id: String) {
        self.consumer_ids.entry(source).or_default().push((track_sid, consumer_id));
    }

    pub fn take_consumers_for(&mut self, source: &ParticipantSid) -> Vec<(TrackSid, String)> {
        self.consumer_ids.remove(source).unwrap_or_default()
    }
}
