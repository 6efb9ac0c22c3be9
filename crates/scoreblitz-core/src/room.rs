use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Room code length in characters.
pub const ROOM_CODE_LEN: usize = 6;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Timing and capacity parameters for a Scoreblitz room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub max_players: u8,
    /// Lead time between `game:start` and the ACTIVE transition.
    pub countdown: Duration,
    /// Fixed game length.
    pub game_duration: Duration,
    /// How long the FINISHED leaderboard stays up before the lobby reset.
    pub lobby_return_delay: Duration,
    /// How long a disconnected player's slot and score are retained.
    pub grace_window: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            countdown: Duration::from_secs(3),
            game_duration: Duration::from_secs(60),
            lobby_return_delay: Duration::from_secs(8),
            grace_window: Duration::from_secs(30),
        }
    }
}

/// Position of a room in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    Lobby,
    Starting,
    Active,
    Finished,
}

impl RoomPhase {
    /// Phases only ever advance LOBBY→STARTING→ACTIVE→FINISHED→LOBBY,
    /// never skip or reverse.
    pub fn can_transition_to(self, next: RoomPhase) -> bool {
        matches!(
            (self, next),
            (RoomPhase::Lobby, RoomPhase::Starting)
                | (RoomPhase::Starting, RoomPhase::Active)
                | (RoomPhase::Active, RoomPhase::Finished)
                | (RoomPhase::Finished, RoomPhase::Lobby)
        )
    }
}

/// Generate a random 6-character uppercase alphanumeric room code.
/// Callers are responsible for collision checks against active rooms.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Check a (case-normalized) room code for the expected format.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
