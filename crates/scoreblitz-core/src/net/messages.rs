use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RoomError;
use crate::leaderboard::LeaderboardEntry;
use crate::player::{Player, PlayerId};
use crate::room::RoomPhase;

/// Actions a client may send. Tagged JSON: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "room:create")]
    CreateRoom(CreateRoomMsg),
    #[serde(rename = "room:join")]
    JoinRoom(JoinRoomMsg),
    #[serde(rename = "room:reconnect")]
    Reconnect(ReconnectMsg),
    #[serde(rename = "room:leave")]
    LeaveRoom,
    #[serde(rename = "game:start")]
    StartGame,
    #[serde(rename = "game:score-event")]
    ScoreEvent(ScoreEventMsg),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomMsg {
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomMsg {
    pub room_code: String,
    pub player_name: String,
}

/// Rebind a new transport connection to an existing player identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectMsg {
    pub room_code: String,
    pub player_id: PlayerId,
}

/// Client-reported scoring action. The server validates and applies it;
/// the client's value is an input, not the truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEventMsg {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: u32,
    pub timestamp: u64,
}

/// Everything the server sends, acknowledgments and broadcasts alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "room:created")]
    RoomCreated(RoomCreatedMsg),
    #[serde(rename = "room:joined")]
    RoomJoined(RoomJoinedMsg),
    #[serde(rename = "room:player-joined")]
    PlayerJoined(PlayerJoinedMsg),
    #[serde(rename = "room:player-left")]
    PlayerLeft(PlayerRefMsg),
    #[serde(rename = "room:players-sync")]
    PlayersSync(PlayersSyncMsg),
    #[serde(rename = "room:player-disconnected")]
    PlayerDisconnected(PlayerRefMsg),
    #[serde(rename = "room:player-reconnected")]
    PlayerReconnected(PlayerRefMsg),
    #[serde(rename = "room:state-changed")]
    StateChanged(StateChangedMsg),
    #[serde(rename = "room:error")]
    RoomError(RoomErrorMsg),
    #[serde(rename = "game:starting")]
    GameStarting(GameStartingMsg),
    #[serde(rename = "game:started")]
    GameStarted,
    #[serde(rename = "game:score-update")]
    ScoreUpdate(ScoreUpdateMsg),
    #[serde(rename = "game:finished")]
    GameFinished(GameFinishedMsg),
}

/// Acknowledgment for `room:create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatedMsg {
    pub success: bool,
    pub room_id: Option<Uuid>,
    pub room_code: Option<String>,
    pub player_id: Option<PlayerId>,
    pub error: Option<RoomError>,
}

impl RoomCreatedMsg {
    pub fn ok(room_id: Uuid, room_code: String, player_id: PlayerId) -> Self {
        Self {
            success: true,
            room_id: Some(room_id),
            room_code: Some(room_code),
            player_id: Some(player_id),
            error: None,
        }
    }

    pub fn err(error: RoomError) -> Self {
        Self {
            success: false,
            room_id: None,
            room_code: None,
            player_id: None,
            error: Some(error),
        }
    }
}

/// Acknowledgment for `room:join` and `room:reconnect`. Carries a full room
/// snapshot so a rejoining connection misses nothing from its outage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedMsg {
    pub success: bool,
    pub room_id: Option<Uuid>,
    pub room_code: Option<String>,
    pub player_id: Option<PlayerId>,
    pub players: Vec<Player>,
    pub state: Option<RoomPhase>,
    /// Countdown anchor, present once the room has left LOBBY.
    pub start_at: Option<u64>,
    /// Game length in milliseconds.
    pub duration: Option<u64>,
    pub error: Option<RoomError>,
}

impl RoomJoinedMsg {
    pub fn err(error: RoomError) -> Self {
        Self {
            success: false,
            room_id: None,
            room_code: None,
            player_id: None,
            players: Vec::new(),
            state: None,
            start_at: None,
            duration: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedMsg {
    pub player: Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRefMsg {
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayersSyncMsg {
    pub players: Vec<Player>,
    pub host_id: PlayerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangedMsg {
    pub phase: RoomPhase,
}

/// Directed error for requests without a dedicated acknowledgment shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomErrorMsg {
    pub error: RoomError,
    pub message: String,
}

impl RoomErrorMsg {
    pub fn from_error(error: RoomError) -> Self {
        Self {
            error,
            message: error.to_string(),
        }
    }
}

/// Countdown announcement. Clients compute their countdown purely from the
/// absolute `startAt` anchor, so client clock skew cannot cause drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartingMsg {
    pub start_at: u64,
    /// Milliseconds.
    pub duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdateMsg {
    pub player_id: PlayerId,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFinishedMsg {
    pub leaderboard: Vec<LeaderboardEntry>,
}
