use scoreblitz_core::net::messages::ScoreEventMsg;
use scoreblitz_core::player::PlayerId;
use scoreblitz_core::room::RoomPhase;

use crate::room::Room;

/// Why a score event was dropped. Rejected events are a no-op, never an
/// error surfaced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreReject {
    WrongPhase,
    UnknownPlayer,
    Disconnected,
    ValueOutOfBounds,
}

/// Validates client score events against the authoritative room state and
/// applies them. The server owns the running totals; the client's `value`
/// is an input to be validated, not trusted.
pub struct ScoreAggregator {
    max_event_value: u32,
}

impl ScoreAggregator {
    pub fn new(max_event_value: u32) -> Self {
        Self { max_event_value }
    }

    /// Apply one event. Returns the player's new total for broadcast, or
    /// the reason the event was dropped.
    pub fn apply(
        &self,
        room: &mut Room,
        player_id: PlayerId,
        event: &ScoreEventMsg,
    ) -> Result<u32, ScoreReject> {
        if room.phase != RoomPhase::Active {
            return Err(ScoreReject::WrongPhase);
        }
        if event.value == 0 || event.value > self.max_event_value {
            return Err(ScoreReject::ValueOutOfBounds);
        }
        let Some(player) = room.player_mut(player_id) else {
            return Err(ScoreReject::UnknownPlayer);
        };
        if !player.connected {
            return Err(ScoreReject::Disconnected);
        }
        player.score = player.score.saturating_add(event.value);
        Ok(player.score)
    }
}
