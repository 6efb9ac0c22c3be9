use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use scoreblitz_core::net::messages::{
    ClientMessage, CreateRoomMsg, JoinRoomMsg, ReconnectMsg, RoomCreatedMsg, RoomJoinedMsg,
    ScoreEventMsg, ServerMessage,
};
use scoreblitz_core::net::protocol::{decode_server_message, encode_client_message};
use scoreblitz_core::player::PlayerId;
use scoreblitz_core::time::now_millis;

use scoreblitz_server::build_app;
use scoreblitz_server::config::{RoomsConfig, ServerConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default configuration.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server with game timers shrunk to tens of milliseconds,
    /// so full lifecycle tests run quickly.
    pub async fn with_fast_timers() -> Self {
        let config = ServerConfig {
            rooms: RoomsConfig {
                countdown_ms: 100,
                game_duration_ms: 300,
                lobby_return_delay_ms: 100,
                grace_window_ms: 200,
                ..RoomsConfig::default()
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage as a JSON text frame.
pub async fn ws_send(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

/// Read the next ServerMessage (5s timeout).
pub async fn ws_read(stream: &mut WsStream) -> ServerMessage {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_server_message(text.as_str()).unwrap();
                },
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read the next ServerMessage, returning None on timeout.
pub async fn ws_try_read(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerMessage> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_server_message(text.as_str()).unwrap();
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Keep reading until `matcher` accepts a message, skipping everything else.
pub async fn ws_wait_for<T>(
    stream: &mut WsStream,
    mut matcher: impl FnMut(ServerMessage) -> Option<T>,
) -> T {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            let msg = match stream.next().await {
                Some(Ok(Message::Text(text))) => decode_server_message(text.as_str()).unwrap(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            };
            if let Some(v) = matcher(msg) {
                return v;
            }
        }
    })
    .await
    .expect("Timed out waiting for matching message")
}

/// Assert the server closes the connection without sending anything.
pub async fn ws_expect_close(stream: &mut WsStream) {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(Message::Text(text))) => {
                    panic!("Expected close, got message: {text}")
                },
                Some(Err(_)) => return,
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for close")
}

/// Create a room and return the successful acknowledgment.
pub async fn ws_create_room(stream: &mut WsStream, name: &str) -> RoomCreatedMsg {
    ws_send(
        stream,
        &ClientMessage::CreateRoom(CreateRoomMsg {
            player_name: name.to_string(),
        }),
    )
    .await;
    match ws_read(stream).await {
        ServerMessage::RoomCreated(ack) => {
            assert!(ack.success, "Expected successful create: {ack:?}");
            ack
        },
        other => panic!("Expected room:created, got: {other:?}"),
    }
}

/// Join a room. Returns the acknowledgment, success or not.
pub async fn ws_join_room(stream: &mut WsStream, room_code: &str, name: &str) -> RoomJoinedMsg {
    ws_send(
        stream,
        &ClientMessage::JoinRoom(JoinRoomMsg {
            room_code: room_code.to_string(),
            player_name: name.to_string(),
        }),
    )
    .await;
    match ws_read(stream).await {
        ServerMessage::RoomJoined(ack) => ack,
        other => panic!("Expected room:joined, got: {other:?}"),
    }
}

/// Reconnect to a room as an existing player. Returns the acknowledgment.
pub async fn ws_reconnect(stream: &mut WsStream, room_code: &str, player_id: PlayerId) -> RoomJoinedMsg {
    ws_send(
        stream,
        &ClientMessage::Reconnect(ReconnectMsg {
            room_code: room_code.to_string(),
            player_id,
        }),
    )
    .await;
    match ws_read(stream).await {
        ServerMessage::RoomJoined(ack) => ack,
        other => panic!("Expected room:joined, got: {other:?}"),
    }
}

/// Send one score event.
pub async fn ws_score(stream: &mut WsStream, value: u32) {
    ws_send(
        stream,
        &ClientMessage::ScoreEvent(ScoreEventMsg {
            kind: "hit".to_string(),
            value,
            timestamp: now_millis(),
        }),
    )
    .await;
}
