use std::collections::VecDeque;
use std::time::{Duration, Instant};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use sfunet_domain::{ClientIntent, ErrorKind, ServerEvent};
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::ws::connection::Conn;
use crate::ws::{cleanup, context};

/// Upgrades `/ws` ("a duplex text-frame channel at `/` or `/ws`").
/// The bearer credential is not verified here: `joinRoom` is the
/// only handler that validates a token, so an unauthenticated socket is
/// accepted and simply has nowhere to go until it sends one.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state))
}

/// Drives one signaling connection end to end: framing, heartbeat,
/// inbound back-pressure, and the bad-intent counter (,
/// §5, §7). A single task owns the socket, so sequentially awaiting
/// `dispatcher.dispatch(...)` here *is* the "serialized per connection"
/// guarantee asks for — no extra lock is needed.
async fn run_connection(socket: WebSocket, state: AppState) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Outbound send queue : a bounded FIFO per connection. Sized
    // to Q_max so a consumer that can't keep up is detected here rather
    // than growing memory without bound; fan-out writes with `try_send`
    // and evicts on `Full` (see `registry::send_or_evict`), so this task's
    // only job is draining it into the socket as fast as the peer allows.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(state.settings.transport.q_max);

    let writer_task = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if ws_sink.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = ws_sink.close().await;
    });
    let writer_abort = writer_task.abort_handle();
    state.connections.register(connection_id.clone(), outbound_tx.clone(), writer_abort.clone());

    let mut conn = Conn::new(connection_id.clone(), outbound_tx.clone());
    conn.send(&ServerEvent::Connected { connection_id: connection_id.clone() });

    let t_ping = Duration::from_secs(state.settings.transport.t_ping_secs);
    let w_bad = Duration::from_secs(state.settings.resilience.w_bad_secs);
    let n_bad = state.settings.resilience.n_bad as usize;
    let mut ping_interval = tokio::time::interval(t_ping);
    ping_interval.tick().await; // first tick fires immediately
    let mut last_seen = Instant::now();
    let mut bad_frames: VecDeque<Instant> = VecDeque::new();

    loop {
        tokio::select! {
            biased;

            frame = ws_stream.next() => {
                let Some(frame) = frame else { break };
                let msg = match frame {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "websocket read error");
                        break;
                    }
                };
                last_seen = Instant::now();
                match msg {
                    Message::Text(text) => {
                        if !handle_text_frame(&state, &mut conn, &text, &mut bad_frames, w_bad, n_bad).await {
                            break;
                        }
                    }
                    Message::Binary(_) => {
                        // Protocol framing error : only UTF-8 JSON
                        // text frames are recognized.
                        conn.send(&ServerEvent::error(ErrorKind::InvalidRequest, "binary frames are not supported"));
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(_) => break,
                }
            }

            _ = ping_interval.tick() => {
                if last_seen.elapsed() > t_ping * 2 {
                    tracing::debug!(connection_id = %connection_id, "peer silent past 2x heartbeat interval, closing");
                    break;
                }
                if outbound_tx.try_send(Message::Ping(Vec::new().into())).is_err() {
                    break;
                }
            }
        }
    }

    writer_abort.abort();
    state.connections.unregister(&connection_id);
    finalize_connection(&state, &conn).await;
}

/// Parses and dispatches one text frame, tracking schema failures for the
/// `N_bad`/`W_bad` connection-fatal threshold . Returns `false`
/// when the connection must close.
async fn handle_text_frame(
    state: &AppState,
    conn: &mut Conn,
    text: &str,
    bad_frames: &mut VecDeque<Instant>,
    w_bad: Duration,
    n_bad: usize,
) -> bool {
    match serde_json::from_str::<ClientIntent>(text) {
        Ok(intent) => {
            // Dispatch happens on the same task driving this socket's read
            // loop, so intents are handled strictly in arrival order and no
            // other handler for this connection can run concurrently.
            state.handler_registry.dispatch(state, conn, intent).await;
            true
        }
        Err(e) => {
            conn.send(&ServerEvent::error(ErrorKind::InvalidRequest, format!("malformed intent: {e}")));
            let now = Instant::now();
            bad_frames.push_back(now);
            while bad_frames.front().is_some_and(|t| now.duration_since(*t) > w_bad) {
                bad_frames.pop_front();
            }
            if bad_frames.len() > n_bad {
                tracing::warn!(connection_id = %conn.connection_id, "bad-intent threshold exceeded, closing connection");
                return false;
            }
            true
        }
    }
}

/// Runs the same departure cascade a `leaveRoom` intent would, for sockets
/// that simply disconnect (invariant 6: "within finite time, all
/// adapter resources it owned are closed").
async fn finalize_connection(state: &AppState, conn: &Conn) {
    let Some(room) = context::current_room(state, conn) else {
        return;
    };
    let Some(room_sid) = conn.room_sid().cloned() else {
        return;
    };
    let Some(participant_sid) = conn.participant_sid().cloned() else {
        return;
    };
    cleanup::handle_disconnect(state, &room, &room_sid, &participant_sid, &conn.connection_id).await;
}
