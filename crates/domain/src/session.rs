use serde::{Deserialize, Serialize};

use crate::ids::{ParticipantSid, RoomSid};

/// Per-connection lifecycle states .
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Joining,
    Connected,
    Reconnecting,
    Closed,
}

/// The events that drive session transitions (transition table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connect,
    Joined,
    Disconnect,
    Reconnect,
    Close,
}

impl SessionState {
    /// The transition table from, expressed as a pure function.
    /// Returns `None` for any pair not in the table — the transition is
    /// rejected, logged, and the state does not change.
    fn next(self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;
        match (self, event) {
            (Idle, Connect) => Some(Joining),
            (Joining, Joined) => Some(Connected),
            (Joining, Disconnect) => Some(Idle),
            (Joining, Close) => Some(Closed),
            (Connected, Disconnect) => Some(Idle),
            (Connected, Reconnect) => Some(Reconnecting),
            (Connected, Close) => Some(Closed),
            (Reconnecting, Joined) => Some(Connected),
            (Reconnecting, Disconnect) => Some(Idle),
            (Reconnecting, Close) => Some(Closed),
            _ => None,
        }
    }
}

pub type Listener = Box<dyn Fn(SessionState, SessionState, SessionEvent) + Send + Sync>;

/// Per-connection session (Session). Holds the state machine plus
/// the connection's current room/participant bindings.
pub struct Session {
    pub socket_id: String,
    pub room_sid: Option<RoomSid>,
    pub participant_sid: Option<ParticipantSid>,
    state: SessionState,
    listeners: Vec<Listener>,
}

impl Session {
    pub fn new(socket_id: String) -> Self {
        Self {
            socket_id,
            room_sid: None,
            participant_sid: None,
            state: SessionState::Idle,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn on_transition(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    /// Applies `event`; returns whether the transition was legal. Invalid
    /// transitions are rejected with no state change . Listeners
    /// fire post-transition with `(from, to, event)`; one listener panicking
    /// or failing must not prevent the others from running — each is
    /// invoked independently and any panic is caught at the call site by
    /// the owning connection task, not here.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match self.state.next(event) {
            Some(next) => {
                let from = self.state;
                self.state = next;
                for listener in &self.listeners {
                    listener(from, next, event);
                }
                true
            }
            None => {
                tracing::warn!(
                    socket_id = %self.socket_id,
                    ?event,
                    from = ?self.state,
                    "rejected invalid session transition"
                );
                false
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state == SessionState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle() {
        let mut s = Session::new("sock1".into());
        assert!(s.apply(SessionEvent::Connect));
        assert_eq!(s.state, SessionState::Joining);
        assert!(s.apply(SessionEvent::Joined));
        assert_eq!(s.state, SessionState::Connected);
        assert!(s.apply(SessionEvent::Reconnect));
        assert_eq!(s.state, SessionState::Reconnecting);
        assert!(s.apply(SessionEvent::Joined));
        assert_eq!(s.state, SessionState::Connected);
        assert!(s.apply(SessionEvent::Close));
        assert_eq!(s.state, SessionState::Closed);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut s = Session::new("sock1".into());
        // idle -> joined is not in the table
        assert!(!s.apply(SessionEvent::Joined));
        assert_eq!(s.state, SessionState::Idle);
    }

    #[test]
    fn closed_is_terminal() {
        let mut s = Session::new("sock1".into());
        s.apply(SessionEvent::Connect);
        s.apply(SessionEvent::Close);
        assert!(s.is_terminal());
        assert!(!s.apply(SessionEvent::Connect));
    }

    #[test]
    fn listeners_receive_from_to_event() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let mut s = Session::new("sock1".into());
        s.on_transition(Box::new(move |from, to, event| {
                    assert_eq!(from, SessionState::Idle);
                    assert_eq!(to, SessionState::Joining);
                    assert_eq!(event, SessionEvent::Connect);
                    count2.fetch_add(1, Ordering::SeqCst);
        }));
        s.apply(SessionEvent::Connect);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
