use axum::extract::ws::Message;
use sfunet_domain::{ParticipantSid, RoomSid, ServerEvent, Session};
use tokio::sync::mpsc;

/// Per-socket handle passed down through every handler (`Session`
/// plus the connection id "connected" frame introduces). Not
/// shared across tasks — owned by the single task driving this socket's
/// `tokio::select!` loop.
pub struct Conn {
    pub connection_id: String,
    pub outbound: mpsc::Sender<Message>,
    pub session: Session,
}

impl Conn {
    pub fn new(connection_id: String, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            session: Session::new(connection_id.clone()),
            connection_id,
            outbound,
        }
    }

    pub fn room_sid(&self) -> Option<&RoomSid> {
        self.session.room_sid.as_ref()
    }

    pub fn participant_sid(&self) -> Option<&ParticipantSid> {
        self.session.participant_sid.as_ref()
    }

    /// Serializes and enqueues an event on this connection's own outbound
    /// channel. Uses `try_send`, never `.await`: the same task that calls
    /// this one is also the task draining the channel into the socket (the
    /// single-task-per-connection loop), so a blocking send here would
    /// deadlock the connection against itself once `Q_max` fills.
    pub fn send(&self, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(text) => match self.outbound.try_send(Message::Text(text.into())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(connection_id = %self.connection_id, "own outbound queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize server event");
            }
        }
    }
}
