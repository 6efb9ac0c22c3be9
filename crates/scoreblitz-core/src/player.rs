use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable player identity. Survives reconnection; the transport connection
/// holds a reference to this, never the reverse.
pub type PlayerId = Uuid;

/// Maximum display name length after trimming, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// A player participating in a Scoreblitz room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub is_host: bool,
    pub connected: bool,
    /// Epoch milliseconds. Leaderboard tie-break key: earlier joiners rank higher.
    pub joined_at: u64,
}

impl Player {
    pub fn new(name: String, is_host: bool, joined_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            score: 0,
            is_host,
            connected: true,
            joined_at,
        }
    }
}

/// Validate and normalize a display name: trimmed, 1–20 characters, no
/// control characters. Returns `None` when the name is unusable.
pub fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN || name.chars().any(char::is_control)
    {
        return None;
    }
    Some(name.to_string())
}
