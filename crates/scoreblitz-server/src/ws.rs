use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::FromRequest;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use scoreblitz_core::error::RoomError;
use scoreblitz_core::net::messages::{ClientMessage, RoomCreatedMsg, RoomJoinedMsg, ServerMessage};
use scoreblitz_core::net::protocol::{
    MAX_MESSAGE_SIZE, decode_client_message, encode_server_message,
};
use scoreblitz_core::player::PlayerId;

use crate::state::{AppState, ConnectionGuard, IpConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    // Per-IP connection limit
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
    let max_per_ip = state.config.limits.max_ws_per_ip;
    let ip_guard = IpConnectionGuard::try_acquire(ip, Arc::clone(&state.ws_per_ip), max_per_ip);
    let Some(ip_guard) = ip_guard else {
        tracing::warn!(%ip, max_per_ip, "Per-IP WS connection limit reached");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    };

    // Perform WebSocket upgrade manually
    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, ip_guard))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, _ip_guard: IpConnectionGuard) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The first frame must open a session: room:create, room:join or
    // room:reconnect. Anything else closes the connection.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Text(text))) => text,
        _ => return,
    };

    let session = match attempt_open(first_msg.as_str(), &state).await {
        OpenResult::Success(session) => session,
        OpenResult::Error(ack) => {
            send_direct(&mut ws_sender, &ack).await;
            return;
        },
        OpenResult::Reject => return,
    };

    let Session {
        room_code,
        player_id,
        ack,
        rx,
    } = session;

    // Ack goes out on the sink before the writer task starts, so broadcasts
    // already queued for this player can never overtake it.
    if !send_direct(&mut ws_sender, &ack).await {
        state.registry.disconnect(&room_code, player_id).await;
        return;
    }

    spawn_writer(ws_sender, rx);

    let exit = read_loop(&mut ws_receiver, &state, &room_code, player_id).await;

    match exit {
        Exit::Leave => state.registry.leave(&room_code, player_id).await,
        Exit::Dropped => state.registry.disconnect(&room_code, player_id).await,
    }
}

struct Session {
    room_code: String,
    player_id: PlayerId,
    ack: ServerMessage,
    rx: mpsc::Receiver<Utf8Bytes>,
}

enum OpenResult {
    Success(Session),
    /// A well-formed open request that failed; the ack explains why.
    Error(ServerMessage),
    /// Not an open request at all. Close without a reply.
    Reject,
}

async fn attempt_open(frame: &str, state: &AppState) -> OpenResult {
    let Ok(msg) = decode_client_message(frame) else {
        return OpenResult::Reject;
    };
    let buffer = state.config.limits.player_message_buffer;

    match msg {
        ClientMessage::CreateRoom(create) => {
            let (tx, rx) = mpsc::channel::<Utf8Bytes>(buffer);
            match state.registry.create_room(&create.player_name, tx).await {
                Ok(ack) => {
                    let room_code = ack.room_code.clone().unwrap_or_default();
                    let player_id = ack.player_id.unwrap_or_default();
                    OpenResult::Success(Session {
                        room_code,
                        player_id,
                        ack: ServerMessage::RoomCreated(ack),
                        rx,
                    })
                },
                Err(e) => OpenResult::Error(ServerMessage::RoomCreated(RoomCreatedMsg::err(e))),
            }
        },
        ClientMessage::JoinRoom(join) => {
            let (tx, rx) = mpsc::channel::<Utf8Bytes>(buffer);
            match state
                .registry
                .join_room(&join.room_code, &join.player_name, tx)
                .await
            {
                Ok(ack) => match (ack.room_code.clone(), ack.player_id) {
                    (Some(room_code), Some(player_id)) => OpenResult::Success(Session {
                        room_code,
                        player_id,
                        ack: ServerMessage::RoomJoined(ack),
                        rx,
                    }),
                    _ => OpenResult::Reject,
                },
                Err(e) => OpenResult::Error(ServerMessage::RoomJoined(RoomJoinedMsg::err(e))),
            }
        },
        ClientMessage::Reconnect(reconnect) => {
            let (tx, rx) = mpsc::channel::<Utf8Bytes>(buffer);
            match state
                .registry
                .reconnect(&reconnect.room_code, reconnect.player_id, tx)
                .await
            {
                Ok(ack) => match ack.room_code.clone() {
                    Some(room_code) => OpenResult::Success(Session {
                        room_code,
                        player_id: reconnect.player_id,
                        ack: ServerMessage::RoomJoined(ack),
                        rx,
                    }),
                    None => OpenResult::Reject,
                },
                Err(e) => OpenResult::Error(ServerMessage::RoomJoined(RoomJoinedMsg::err(e))),
            }
        },
        _ => OpenResult::Reject,
    }
}

async fn send_direct(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> bool {
    let Ok(text) = encode_server_message(msg) else {
        tracing::warn!("Failed to encode direct message");
        return false;
    };
    if let Err(e) = ws_sender.send(Message::Text(Utf8Bytes::from(text))).await {
        tracing::debug!(error = %e, "Failed to send on socket");
        return false;
    }
    true
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
) {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// How the session ended. An explicit `room:leave` removes the player
/// immediately; a dropped transport starts the reconnect grace window.
enum Exit {
    Leave,
    Dropped,
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    room_code: &str,
    player_id: PlayerId,
) -> Exit {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => return Exit::Dropped,
            _ => continue,
        };

        // Rate limit: drop messages that exceed per-connection rate
        if !rate_limiter.allow() {
            tracing::warn!(%player_id, room_code, "Rate limited");
            continue;
        }

        // Drop oversized and empty messages
        if text.len() > MAX_MESSAGE_SIZE || text.is_empty() {
            continue;
        }

        let client_msg = match decode_client_message(text.as_str()) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(%player_id, room_code, error = %e, "Malformed frame dropped");
                continue;
            },
        };

        match client_msg {
            ClientMessage::StartGame => {
                if let Err(e) = state.registry.start_game(room_code, player_id).await {
                    tracing::debug!(%player_id, room_code, error = %e, "Start request rejected");
                    state.registry.send_error(room_code, player_id, e).await;
                }
            },
            ClientMessage::ScoreEvent(event) => {
                state.registry.apply_score(room_code, player_id, &event).await;
            },
            ClientMessage::LeaveRoom => return Exit::Leave,
            // The session is already bound to a room
            ClientMessage::CreateRoom(_) | ClientMessage::JoinRoom(_) | ClientMessage::Reconnect(_) => {
                state
                    .registry
                    .send_error(room_code, player_id, RoomError::AlreadyJoined)
                    .await;
            },
        }
    }

    Exit::Dropped
}
