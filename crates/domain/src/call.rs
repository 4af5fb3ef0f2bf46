use serde::{Deserialize, Serialize};

use crate::ids::{CallId, ParticipantSid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    Pending,
    Accepted,
    Rejected,
    Ended,
}

impl CallState {
    /// Rejected and Ended are terminal (Call lifecycle).
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Rejected | CallState::Ended)
    }

    /// The legal next states for a given transition event.
    fn can_transition_to(&self, next: CallState) -> bool {
        matches!(
            (self, next),
            (CallState::Pending, CallState::Accepted)
            | (CallState::Pending, CallState::Rejected)
            | (CallState::Pending, CallState::Ended)
            | (CallState::Accepted, CallState::Ended)
        )
    }
}

/// A one-to-one call between two participants in the same room .
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub call_id: CallId,
    pub caller_sid: ParticipantSid,
    pub target_sid: ParticipantSid,
    pub state: CallState,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

impl Call {
    pub fn new(
        call_id: CallId,
        caller_sid: ParticipantSid,
        target_sid: ParticipantSid,
        start_time: i64,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            call_id,
            caller_sid,
            target_sid,
            state: CallState::Pending,
            start_time,
            end_time: None,
            metadata,
        }
    }

    /// Unordered pair key used for the room's one-active-call-per-pair index.
    pub fn pair_key(a: &ParticipantSid, b: &ParticipantSid) -> (ParticipantSid, ParticipantSid) {
        if a.0 <= b.0 {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }

    pub fn involves(&self, sid: &ParticipantSid) -> bool {
        &self.caller_sid == sid || &self.target_sid == sid
    }

    pub fn other_party(&self, sid: &ParticipantSid) -> Option<&ParticipantSid> {
        if &self.caller_sid == sid {
            Some(&self.target_sid)
        } else if &self.target_sid == sid {
            Some(&self.caller_sid)
        } else {
            None
        }
    }

    /// Attempts the transition, returning whether it was legal. Terminal
    /// states never move (: "rejected/ended are terminal").
    pub fn transition(&mut self, next: CallState, now: i64) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.end_time = Some(now);
        }
        true
    }
}
