use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens a raw signaling socket and drains the `connected` frame every
/// connection gets on upgrade, so test bodies can start from `joinRoom`
/// without re-asserting that boilerplate each time.
pub async fn connect(ws_url: &str) -> WsStream {
    let (mut stream, _) = connect_async(ws_url).await.expect("websocket handshake failed");
    let connected = recv_json(&mut stream).await;
    assert_eq!(connected["type"], "connected");
    stream
}

pub async fn send_json(stream: &mut WsStream, value: Value) {
    stream.send(Message::Text(value.to_string().into())).await.expect("failed to send frame");
}

/// Waits up to 5s for the next text frame and parses it as JSON. Any other
/// frame kind (ping/pong/close) is unexpected in these tests and panics.
pub async fn recv_json(stream: &mut WsStream) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
    .await
    .expect("timed out waiting for a server frame")
    .expect("socket closed before a frame arrived")
    .expect("websocket read error");
    match frame {
        Message::Text(text) => serde_json::from_str(&text).expect("server frame was not valid JSON"),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Reads frames until one whose `type` matches `want`, discarding anything
/// else (e.g. a `pong` interleaved by an unrelated heartbeat). Panics on
/// timeout so a missing event fails the test loudly instead of hanging.
pub async fn recv_event(stream: &mut WsStream, want: &str) -> Value {
    loop {
        let frame = recv_json(stream).await;
        if frame["type"] == want {
            return frame;
        }
    }
}

pub async fn join_room(stream: &mut WsStream, room: &str, token: &str) -> Value {
    send_json(
        stream,
        serde_json::json!({ "type": "joinRoom", "room": room, "token": token }),
    )
    .await;
    recv_event(stream, "roomJoined").await
}
