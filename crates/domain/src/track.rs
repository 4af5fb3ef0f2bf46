use serde::{Deserialize, Serialize};

use crate::ids::TrackSid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackSource {
    Camera,
    Microphone,
    Screen,
    ScreenAudio,
}

/// A published media track (: sid equals the underlying producer id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub sid: TrackSid,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub muted: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub simulcast: bool,
}

impl Track {
    pub fn new(sid: TrackSid, kind: TrackKind, source: TrackSource) -> Self {
        Self {
            sid,
            kind,
            source,
            muted: false,
            width: None,
            height: None,
            simulcast: false,
        }
    }

    /// `(source, kind)` is the dedup key: invariant (b) — at most
    /// one active track per participant per `(source, kind)` pair.
    pub fn replacement_key(&self) -> (TrackSource, TrackKind) {
        (self.source, self.kind)
    }
}
