use serde::{Deserialize, Serialize};

/// Error kinds surfaced through the request/acknowledgment path. All of
/// these are recovered at the point of the offending action; none are fatal
/// to the room or the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomError {
    RoomNotFound,
    RoomFull,
    /// The room is not in a phase that accepts the request (e.g. joining
    /// once the countdown has begun).
    InvalidState,
    NotHost,
    AlreadyStarted,
    InvalidName,
    InvalidCode,
    /// The connection is already bound to a player.
    AlreadyJoined,
    /// No player with that ID in the room (reconnect after grace expiry).
    UnknownPlayer,
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::RoomNotFound => "room not found",
            Self::RoomFull => "room is full",
            Self::InvalidState => "room is not accepting that request in its current phase",
            Self::NotHost => "only the host can start the game",
            Self::AlreadyStarted => "game already started",
            Self::InvalidName => "invalid player name",
            Self::InvalidCode => "invalid room code",
            Self::AlreadyJoined => "connection is already bound to a room",
            Self::UnknownPlayer => "no such player in this room",
        };
        write!(f, "{msg}")
    }
}

impl std::error::Error for RoomError {}
