use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;

use scoreblitz_core::player::PlayerId;
use scoreblitz_core::time::now_millis;

use crate::registry::RoomRegistry;

/// Cancellable timer handles for one room's scheduled transitions: countdown
/// expiry, duration expiry, the post-game lobby return, and one grace timer
/// per disconnected player. Room teardown must call `cancel_all` so a stale
/// task never fires against a destroyed room; callbacks additionally
/// re-validate phase under the room lock, which makes a raced timer harmless.
#[derive(Default)]
pub struct GameClock {
    countdown: Option<AbortHandle>,
    game_over: Option<AbortHandle>,
    lobby_return: Option<AbortHandle>,
    grace: HashMap<PlayerId, AbortHandle>,
}

impl GameClock {
    pub fn set_countdown(&mut self, handle: AbortHandle) {
        if let Some(old) = self.countdown.replace(handle) {
            old.abort();
        }
    }

    pub fn set_game_over(&mut self, handle: AbortHandle) {
        if let Some(old) = self.game_over.replace(handle) {
            old.abort();
        }
    }

    pub fn set_lobby_return(&mut self, handle: AbortHandle) {
        if let Some(old) = self.lobby_return.replace(handle) {
            old.abort();
        }
    }

    pub fn set_grace(&mut self, player_id: PlayerId, handle: AbortHandle) {
        if let Some(old) = self.grace.insert(player_id, handle) {
            old.abort();
        }
    }

    /// Cancel a player's grace timer. Returns true if one was pending.
    pub fn cancel_grace(&mut self, player_id: PlayerId) -> bool {
        match self.grace.remove(&player_id) {
            Some(handle) => {
                handle.abort();
                true
            },
            None => false,
        }
    }

    /// Cancel the game-phase timers, leaving grace timers running. Used on
    /// the reset back to LOBBY, where disconnected players keep their window.
    pub fn cancel_game_timers(&mut self) {
        for handle in [
            self.countdown.take(),
            self.game_over.take(),
            self.lobby_return.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }

    /// Cancel everything. Called on room teardown and registry drain.
    pub fn cancel_all(&mut self) {
        self.cancel_game_timers();
        for (_, handle) in self.grace.drain() {
            handle.abort();
        }
    }
}

/// Sleep until an absolute epoch-millisecond deadline. The deadline is the
/// same anchor shared with clients, so the server fires at the instant the
/// clients count down to, independent of when the task was spawned.
async fn sleep_until_epoch(deadline_ms: u64) {
    let now = now_millis();
    if deadline_ms > now {
        tokio::time::sleep(Duration::from_millis(deadline_ms - now)).await;
    }
}

/// Schedule the STARTING → ACTIVE transition at `start_at`.
pub fn schedule_countdown(registry: Arc<RoomRegistry>, code: String, start_at: u64) -> AbortHandle {
    let task = tokio::spawn(async move {
        sleep_until_epoch(start_at).await;
        registry.on_countdown_expired(&code).await;
    });
    task.abort_handle()
}

/// Schedule the ACTIVE → FINISHED transition at `end_at`.
pub fn schedule_game_over(registry: Arc<RoomRegistry>, code: String, end_at: u64) -> AbortHandle {
    let task = tokio::spawn(async move {
        sleep_until_epoch(end_at).await;
        registry.on_game_over(&code).await;
    });
    task.abort_handle()
}

/// Schedule the FINISHED → LOBBY reset at `reset_at`.
pub fn schedule_lobby_return(
    registry: Arc<RoomRegistry>,
    code: String,
    reset_at: u64,
) -> AbortHandle {
    let task = tokio::spawn(async move {
        sleep_until_epoch(reset_at).await;
        registry.on_lobby_return(&code).await;
    });
    task.abort_handle()
}

/// Schedule permanent removal of a disconnected player after the grace
/// window.
pub fn schedule_grace_expiry(
    registry: Arc<RoomRegistry>,
    code: String,
    player_id: PlayerId,
    window: Duration,
) -> AbortHandle {
    let task = tokio::spawn(async move {
        tokio::time::sleep(window).await;
        registry.on_grace_expired(&code, player_id).await;
    });
    task.abort_handle()
}
