use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

struct Entry {
    sender: mpsc::Sender<Message>,
    abort: AbortHandle,
}

/// Global `connection_id -> outbound channel` map (/// "multiple connections per identity" supplement). Kept independent of
/// `Room`/`Participant` so fan-out can address a single tab/device without
/// taking a room lock, and so a slow consumer can be evicted by aborting its
/// task directly rather than leaving it to keep falling behind (/// `Q_max`).
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Entry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn register(&self, connection_id: String, sender: mpsc::Sender<Message>, abort: AbortHandle) {
        self.connections.insert(connection_id, Entry { sender, abort });
    }

    pub fn unregister(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    /// Enqueues `text` for delivery on `connection_id`'s outbound channel.
    /// A full queue means the consumer is behind `Q_max` frames; rather than
    /// block or drop silently, we abort the connection's task outright so
    /// the socket actually closes instead of limping along.
    pub fn send_or_evict(&self, connection_id: &str, text: String) {
        let Some(entry) = self.connections.get(connection_id) else {
            return;
        };
        match entry.sender.try_send(Message::Text(text.into())) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id, "outbound queue full, evicting slow consumer");
                entry.abort.abort();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
