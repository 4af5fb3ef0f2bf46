use std::collections::{HashMap, HashSet};

use serde_json::Value;
use sfunet_domain::{ParticipantSid, Track, TrackSid};

/// The client's optimistic or server-reported view of one participant,
/// keyed by track sid so membership and per-track conflicts can be diffed
/// independently of ordering.
#[derive(Debug, Clone, Default)]
pub struct ParticipantSnapshot {
    pub identity: String,
    pub metadata: Option<Value>,
    pub tracks: HashMap<TrackSid, Track>,
}

/// A point-in-time view of a room's participants, from either side —
/// the client's own optimistic state, or what it fetched from the server
/// after a reconnect.
#[derive(Debug, Clone, Default)]
pub struct RoomSnapshot {
    pub participants: HashMap<ParticipantSid, ParticipantSnapshot>,
}

/// The reconciliation policy applied once the two snapshots are diffed.
/// Default is `PreferServer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconciliationPolicy {
    #[default]
    PreferServer,
    PreferLocal,
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackKey {
    pub participant_sid: ParticipantSid,
    pub track_sid: TrackSid,
}

/// One participant whose locally-held metadata disagrees with what the
/// server reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDiff {
    pub participant_sid: ParticipantSid,
    pub local: Option<Value>,
    pub server: Option<Value>,
}

/// The three track sets plus the metadata diff: tracks only the client
/// believes exist, tracks only the server reports, and tracks both sides
/// have but disagree about (muted state, dimensions, etc — not just
/// presence).
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    pub local_only: Vec<TrackKey>,
    pub server_only: Vec<TrackKey>,
    pub conflicting: Vec<TrackKey>,
    pub metadata_diff: Vec<MetadataDiff>,
}

/// Pure diff of two snapshots — no I/O, no clock, no randomness, so it is
/// deterministic under test by construction.
pub fn diff(local: &RoomSnapshot, server: &RoomSnapshot) -> ReconciliationReport {
    let mut report = ReconciliationReport::default();
    let all_participants: HashSet<&ParticipantSid> =
    local.participants.keys().chain(server.participants.keys()).collect();

    for sid in all_participants {
        let local_p = local.participants.get(sid);
        let server_p = server.participants.get(sid);

        if let Some(local_p) = local_p {
            for (track_sid, track) in &local_p.tracks {
                match server_p.and_then(|p| p.tracks.get(track_sid)) {
                    None => report.local_only.push(TrackKey {
                            participant_sid: sid.clone(),
                            track_sid: track_sid.clone(),
                    }),
                    Some(server_track) if !tracks_equal(track, server_track) => {
                        report.conflicting.push(TrackKey {
                                participant_sid: sid.clone(),
                                track_sid: track_sid.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        if let Some(server_p) = server_p {
            for track_sid in server_p.tracks.keys() {
                let known_locally = local_p.is_some_and(|p| p.tracks.contains_key(track_sid));
                if !known_locally {
                    report.server_only.push(TrackKey {
                            participant_sid: sid.clone(),
                            track_sid: track_sid.clone(),
                    });
                }
            }
        }

        let local_meta = local_p.and_then(|p| p.metadata.clone());
        let server_meta = server_p.and_then(|p| p.metadata.clone());
        if local_meta != server_meta {
            report.metadata_diff.push(MetadataDiff {
                    participant_sid: sid.clone(),
                    local: local_meta,
                    server: server_meta,
            });
        }
    }

    report
}

fn tracks_equal(a: &Track, b: &Track) -> bool {
    a.kind == b.kind
    && a.source == b.source
    && a.muted == b.muted
    && a.width == b.width
    && a.height == b.height
    && a.simulcast == b.simulcast
}

/// Produces the final reconciled snapshot for the active policy. Computed
/// directly from the two snapshots rather than replayed from
/// `ReconciliationReport` — the report is for observability/tests, the
/// final state is a plain set union so each policy stays a one-line rule:
///
/// - `preferServer`: discard every locally-only optimistic entry, keep
///   server truth as-is (the default).
/// - `preferLocal`: keep the locally-led view, but still adopt anything
///   newly learned from the server (a reconnect must not un-learn remote
///   participants/tracks the client never had a chance to see yet).
/// - `merge`: union both sides — a locally-published track the server
///   hasn't echoed back yet survives alongside everything server-reported.
///
/// Metadata conflicts are resolved in the server's favor under both
/// `preferLocal` and `merge`.
pub fn apply_policy(local: &RoomSnapshot, server: &RoomSnapshot, policy: ReconciliationPolicy) -> RoomSnapshot {
    match policy {
        ReconciliationPolicy::PreferServer => server.clone(),
        ReconciliationPolicy::PreferLocal => merge_snapshots(local, server),
        ReconciliationPolicy::Merge => merge_snapshots(local, server),
    }
}

/// Unions `overlay`'s participants/tracks onto `base`, keeping everything
/// already in `base` and adding anything `overlay` has that `base` lacks.
/// Metadata present in `overlay` always wins when both sides disagree.
fn merge_snapshots(base: &RoomSnapshot, overlay: &RoomSnapshot) -> RoomSnapshot {
    let mut result = base.clone();
    for (sid, overlay_p) in &overlay.participants {
        let entry = result.participants.entry(sid.clone()).or_insert_with(|| ParticipantSnapshot {
                identity: overlay_p.identity.clone(),
                metadata: None,
                tracks: HashMap::new(),
        });
        for (track_sid, track) in &overlay_p.tracks {
            entry.tracks.entry(track_sid.clone()).or_insert_with(|| track.clone());
        }
        if overlay_p.metadata.is_some() {
            entry.metadata = overlay_p.metadata.clone();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfunet_domain::{TrackKind, TrackSource};

    fn mk_track(sid: &str) -> Track {
        Track::new(TrackSid::from(sid), TrackKind::Video, TrackSource::Camera)
    }

    fn snapshot(entries: &[(&str, &[&str])]) -> RoomSnapshot {
        let mut snap = RoomSnapshot::default();
        for (participant_sid, track_sids) in entries {
            let mut tracks = HashMap::new();
            for t in *track_sids {
                tracks.insert(TrackSid::from(*t), mk_track(t));
            }
            snap.participants.insert(
                ParticipantSid::from(*participant_sid),
                ParticipantSnapshot {
                    identity: participant_sid.to_string(),
                    metadata: None,
                    tracks,
                },
            );
        }
        snap
    }

    /// Client C locally has {t1,t2}; peer P has {u1}. Server reports
    /// C:{t1} (t2 pruned on disconnect), P:{u1,u2}.
    #[test]
    fn scenario_reconnect_reconciliation_prefer_server() {
        let local = snapshot(&[("c", &["t1", "t2"]), ("p", &["u1"])]);
        let server = snapshot(&[("c", &["t1"]), ("p", &["u1", "u2"])]);

        let report = diff(&local, &server);
        assert_eq!(report.local_only, vec![TrackKey { participant_sid: "c".into(), track_sid: "t2".into() }]);
        assert_eq!(report.server_only, vec![TrackKey { participant_sid: "p".into(), track_sid: "u2".into() }]);
        assert!(report.conflicting.is_empty());

        let resolved = apply_policy(&local, &server, ReconciliationPolicy::PreferServer);
        let c = &resolved.participants[&ParticipantSid::from("c")];
        assert_eq!(c.tracks.len(), 1);
        assert!(c.tracks.contains_key(&TrackSid::from("t1")));
        let p = &resolved.participants[&ParticipantSid::from("p")];
        assert_eq!(p.tracks.len(), 2);
    }

    #[test]
    fn scenario_reconnect_reconciliation_merge_keeps_local_only() {
        let local = snapshot(&[("c", &["t1", "t2"]), ("p", &["u1"])]);
        let server = snapshot(&[("c", &["t1"]), ("p", &["u1", "u2"])]);

        let resolved = apply_policy(&local, &server, ReconciliationPolicy::Merge);
        let c = &resolved.participants[&ParticipantSid::from("c")];
        assert_eq!(c.tracks.len(), 2);
        assert!(c.tracks.contains_key(&TrackSid::from("t2")));
        let p = &resolved.participants[&ParticipantSid::from("p")];
        assert_eq!(p.tracks.len(), 2);
        assert!(p.tracks.contains_key(&TrackSid::from("u2")));
    }

    #[test]
    fn conflicting_track_detected_when_shared_sid_disagrees() {
        let mut local = snapshot(&[("c", &["t1"])]);
        let mut server = snapshot(&[("c", &["t1"])]);
        local.participants.get_mut(&ParticipantSid::from("c")).unwrap().tracks.get_mut(&TrackSid::from("t1")).unwrap().muted = false;
        server.participants.get_mut(&ParticipantSid::from("c")).unwrap().tracks.get_mut(&TrackSid::from("t1")).unwrap().muted = true;

        let report = diff(&local, &server);
        assert_eq!(report.conflicting, vec![TrackKey { participant_sid: "c".into(), track_sid: "t1".into() }]);
    }

    #[test]
    fn metadata_diff_reported_when_sides_disagree() {
        let mut local = snapshot(&[("c", &[])]);
        let mut server = snapshot(&[("c", &[])]);
        local.participants.get_mut(&ParticipantSid::from("c")).unwrap().metadata = Some(serde_json::json!({"mood": "local"}));
        server.participants.get_mut(&ParticipantSid::from("c")).unwrap().metadata = Some(serde_json::json!({"mood": "server"}));

        let report = diff(&local, &server);
        assert_eq!(report.metadata_diff.len(), 1);
        assert_eq!(report.metadata_diff[0].participant_sid, ParticipantSid::from("c"));
    }
}
