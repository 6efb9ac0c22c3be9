use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

use scoreblitz_core::net::messages::ServerMessage;
use scoreblitz_core::net::protocol::encode_server_message;
use scoreblitz_core::player::PlayerId;

use crate::room::Room;

/// Per-player sender for outbound WebSocket text frames. Bounded so a slow
/// client sheds its own messages instead of backing up the room.
/// `Utf8Bytes` clones are zero-copy when fanning out to multiple players.
pub type PlayerSender = mpsc::Sender<Utf8Bytes>;

/// Serialize once and deliver to every currently connected member. Each
/// recipient's send is isolated: `try_send` on a full or closed queue drops
/// only that player's copy and never blocks the room.
pub fn emit_to_room(room: &Room, msg: &ServerMessage) {
    let frame = match encode_server_message(msg) {
        Ok(text) => Utf8Bytes::from(text),
        Err(e) => {
            tracing::warn!(room = %room.code, error = %e, "Failed to encode broadcast");
            return;
        },
    };
    for player in &room.players {
        if !player.connected {
            continue;
        }
        if let Some(sender) = room.connections.get(&player.id)
            && sender.try_send(frame.clone()).is_err()
        {
            tracing::debug!(
                player_id = %player.id,
                room = %room.code,
                "Skipping broadcast to slow or closed client"
            );
        }
    }
}

/// Deliver an event to a single player, with the same isolation rules.
pub fn emit_to_player(room: &Room, player_id: PlayerId, msg: &ServerMessage) {
    let frame = match encode_server_message(msg) {
        Ok(text) => Utf8Bytes::from(text),
        Err(e) => {
            tracing::warn!(room = %room.code, error = %e, "Failed to encode message");
            return;
        },
    };
    if let Some(sender) = room.connections.get(&player_id)
        && sender.try_send(frame).is_err()
    {
        tracing::debug!(
            player_id = %player_id,
            room = %room.code,
            "Failed to send to player (slow or disconnected)"
        );
    }
}
