use std::collections::HashMap;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use sfunet_domain::{ClientIntent, ServerEvent};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{ClientError, ClientResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A handler registered against one wire `type` (or `"*"` for every frame).
/// Matches the `Listener` shape `sfunet_domain::Session` uses for its own
/// transition listeners — the client mirror reuses the same "plain closure,
/// isolate failures" idiom rather than inventing an event-bus type.
pub type EventListener = Box<dyn Fn(&ServerEvent) + Send + Sync>;

/// Mirrors the server's Signaling Transport from the client
/// side of the same wire contract: frames `ClientIntent`/`ServerEvent` as
/// UTF-8 JSON text frames and dispatches each inbound frame to handlers
/// registered by message kind . One instance owns one
/// WebSocket connection; reconnecting constructs a new one.
pub struct SignalingClient {
    outbound: mpsc::UnboundedSender<Message>,
    listeners: Arc<RwLock<HashMap<&'static str, Vec<EventListener>>>>,
    reader_task: tokio::task::JoinHandle<()>,
    writer_task: tokio::task::JoinHandle<()>,
    /// Signaled once the reader loop ends, for any reason (clean close,
    /// read error, or the peer going silent past the heartbeat budget is
    /// detected by the caller via `Ping`/`Pong` frames passed through by
    /// `tokio-tungstenite` itself). The reconnect coordinator in `session`
    /// awaits this instead of polling.
    pub disconnected: Arc<Notify>,
}

impl SignalingClient {
    pub async fn connect(url: &str) -> ClientResult<Self> {
        let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| ClientError::Connect(e.to_string()))?;
        Ok(Self::from_stream(ws_stream))
    }

    fn from_stream(ws_stream: WsStream) -> Self {
        let (mut sink, mut stream) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let listeners: Arc<RwLock<HashMap<&'static str, Vec<EventListener>>>> = Arc::new(RwLock::new(HashMap::new()));
        let disconnected = Arc::new(Notify::new());

        let writer_task = tokio::spawn(async move {
                while let Some(msg) = outbound_rx.recv().await {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
        });

        let listeners_for_reader = listeners.clone();
        let disconnected_for_reader = disconnected.clone();
        let reader_task = tokio::spawn(async move {
                while let Some(frame) = stream.next().await {
                    let msg = match frame {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::debug!(error = %e, "signaling read error");
                            break;
                        }
                    };
                    let text = match msg {
                        Message::Text(text) => text,
                        Message::Close(_) => break,
                        Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => continue,
                    };
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => dispatch(&listeners_for_reader, &event),
                        Err(e) => {
                            tracing::warn!(error = %e, "received malformed server event");
                        }
                    }
                }
                disconnected_for_reader.notify_waiters();
        });

        Self {
            outbound: outbound_tx,
            listeners,
            reader_task,
            writer_task,
            disconnected,
        }
    }

    /// Registers `handler` for every server event whose `type_name` is
    /// `type_name`, or for all events when `type_name` is `"*"`. Handlers
    /// are invoked synchronously and in registration order; one handler
    /// panicking is not isolated from the others, matching
    /// `sfunet_domain::Session`'s listener contract (the caller is
    /// expected to keep handlers infallible).
    pub fn on(&self, type_name: &'static str, handler: EventListener) {
        self.listeners.write().entry(type_name).or_default().push(handler);
    }

    pub fn send(&self, intent: &ClientIntent) -> ClientResult<()> {
        let text = serde_json::to_string(intent).map_err(|e| ClientError::Protocol(e.to_string()))?;
        self.outbound
        .send(Message::Text(text.into()))
        .map_err(|_| ClientError::Disconnected)
    }

    pub async fn close(self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

fn dispatch(listeners: &Arc<RwLock<HashMap<&'static str, Vec<EventListener>>>>, event: &ServerEvent) {
    let guard = listeners.read();
    if let Some(handlers) = guard.get(event.type_name()) {
        for handler in handlers {
            handler(event);
        }
    }
    if let Some(handlers) = guard.get("*") {
        for handler in handlers {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_registry_keys_by_type_name_or_wildcard() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let listeners: Arc<RwLock<HashMap<&'static str, Vec<EventListener>>>> = Arc::new(RwLock::new(HashMap::new()));
        let specific = Arc::new(AtomicUsize::new(0));
        let wildcard = Arc::new(AtomicUsize::new(0));

        {
            let specific = specific.clone();
            listeners
            .write()
            .entry("pong")
            .or_default()
            .push(Box::new(move |_event| {
                        specific.fetch_add(1, Ordering::SeqCst);
            }));
        }
        {
            let wildcard = wildcard.clone();
            listeners
            .write()
            .entry("*")
            .or_default()
            .push(Box::new(move |_event| {
                        wildcard.fetch_add(1, Ordering::SeqCst);
            }));
        }

        dispatch(&listeners, &ServerEvent::Pong {});
        dispatch(&listeners, &ServerEvent::CameraDisabled {});

        assert_eq!(specific.load(Ordering::SeqCst), 1);
        assert_eq!(wildcard.load(Ordering::SeqCst), 2);
    }
}
