use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use scoreblitz_core::error::RoomError;
use scoreblitz_core::net::messages::{
    GameFinishedMsg, GameStartingMsg, PlayerJoinedMsg, PlayerRefMsg, RoomCreatedMsg, RoomErrorMsg,
    RoomJoinedMsg, ScoreEventMsg, ScoreUpdateMsg, ServerMessage, StateChangedMsg,
};
use scoreblitz_core::player::{Player, PlayerId, normalize_name};
use scoreblitz_core::room::{RoomConfig, RoomPhase, generate_room_code, is_valid_room_code};
use scoreblitz_core::time::now_millis;

use crate::broadcast::{self, PlayerSender};
use crate::clock;
use crate::room::Room;
use crate::score::ScoreAggregator;

pub type SharedRoom = Arc<Mutex<Room>>;

/// Owns every active room. The code→room index has its own lock; each
/// room's state is serialized under its own mutex, so operations on
/// different rooms never contend. Lock order is always index, then room.
///
/// One registry exists per server process, created on boot and drained on
/// shutdown.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, SharedRoom>>,
    aggregator: ScoreAggregator,
    room_config: RoomConfig,
}

impl RoomRegistry {
    pub fn new(room_config: RoomConfig, max_score_event_value: u32) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            aggregator: ScoreAggregator::new(max_score_event_value),
            room_config,
        }
    }

    async fn lookup(&self, code: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(code).map(Arc::clone)
    }

    /// Create a new room in LOBBY with the requester as host.
    pub async fn create_room(
        &self,
        raw_name: &str,
        sender: PlayerSender,
    ) -> Result<RoomCreatedMsg, RoomError> {
        let name = normalize_name(raw_name).ok_or(RoomError::InvalidName)?;
        let host = Player::new(name, true, now_millis());
        let player_id = host.id;

        let shared = {
            let mut rooms = self.rooms.write().await;
            // Rejection sampling: retry until the code misses every active room
            let code = loop {
                let candidate = generate_room_code();
                if !rooms.contains_key(&candidate) {
                    break candidate;
                }
            };
            let room = Room::new(code.clone(), self.room_config.clone(), host, sender);
            let shared = Arc::new(Mutex::new(room));
            rooms.insert(code, Arc::clone(&shared));
            shared
        };

        let room = shared.lock().await;
        tracing::info!(room = %room.code, player_id = %player_id, "Room created");
        broadcast::emit_to_room(&room, &ServerMessage::PlayersSync(room.sync_msg()));
        Ok(RoomCreatedMsg::ok(room.id, room.code.clone(), player_id))
    }

    /// Join an existing room. The ack carries a full snapshot; everyone in
    /// the room (the joiner included) also sees the membership broadcasts.
    pub async fn join_room(
        &self,
        raw_code: &str,
        raw_name: &str,
        sender: PlayerSender,
    ) -> Result<RoomJoinedMsg, RoomError> {
        let name = normalize_name(raw_name).ok_or(RoomError::InvalidName)?;
        let code = raw_code.trim().to_ascii_uppercase();
        if !is_valid_room_code(&code) {
            return Err(RoomError::InvalidCode);
        }
        let shared = self.lookup(&code).await.ok_or(RoomError::RoomNotFound)?;
        let mut room = shared.lock().await;
        room.can_join()?;

        let player = Player::new(name, false, now_millis());
        let player_id = player.id;
        room.add_player(player.clone(), sender);
        tracing::info!(room = %code, player_id = %player_id, "Player joined");

        let ack = room.joined_ack(player_id);
        broadcast::emit_to_room(&room, &ServerMessage::PlayerJoined(PlayerJoinedMsg { player }));
        broadcast::emit_to_room(&room, &ServerMessage::PlayersSync(room.sync_msg()));
        Ok(ack)
    }

    /// Rebind a disconnected player's identity to a fresh connection. The
    /// ack replays the full room snapshot so the rejoiner misses nothing.
    pub async fn reconnect(
        &self,
        raw_code: &str,
        player_id: PlayerId,
        sender: PlayerSender,
    ) -> Result<RoomJoinedMsg, RoomError> {
        let code = raw_code.trim().to_ascii_uppercase();
        if !is_valid_room_code(&code) {
            return Err(RoomError::InvalidCode);
        }
        let shared = self.lookup(&code).await.ok_or(RoomError::RoomNotFound)?;
        let mut room = shared.lock().await;
        room.rebind(player_id, sender)?;
        tracing::info!(room = %code, player_id = %player_id, "Player reconnected");

        broadcast::emit_to_room(
            &room,
            &ServerMessage::PlayerReconnected(PlayerRefMsg { player_id }),
        );
        Ok(room.joined_ack(player_id))
    }

    /// Host-only game start: LOBBY → STARTING plus the countdown timer.
    pub async fn start_game(
        self: &Arc<Self>,
        code: &str,
        requester: PlayerId,
    ) -> Result<(), RoomError> {
        let shared = self.lookup(code).await.ok_or(RoomError::RoomNotFound)?;
        let mut room = shared.lock().await;
        let start_at = room.begin_starting(requester)?;
        let duration = room.config.game_duration.as_millis() as u64;
        tracing::info!(room = %code, player_id = %requester, start_at, "Game starting");

        broadcast::emit_to_room(
            &room,
            &ServerMessage::StateChanged(StateChangedMsg {
                phase: RoomPhase::Starting,
            }),
        );
        broadcast::emit_to_room(
            &room,
            &ServerMessage::GameStarting(GameStartingMsg { start_at, duration }),
        );

        let handle = clock::schedule_countdown(Arc::clone(self), code.to_string(), start_at);
        room.clock.set_countdown(handle);
        Ok(())
    }

    /// Fire-and-forget score path: validate, apply, broadcast the new total.
    /// Rejected events are dropped silently (logged at debug).
    pub async fn apply_score(&self, code: &str, player_id: PlayerId, event: &ScoreEventMsg) {
        let Some(shared) = self.lookup(code).await else {
            return;
        };
        let mut room = shared.lock().await;
        match self.aggregator.apply(&mut room, player_id, event) {
            Ok(score) => {
                room.touch();
                broadcast::emit_to_room(
                    &room,
                    &ServerMessage::ScoreUpdate(ScoreUpdateMsg { player_id, score }),
                );
            },
            Err(reason) => {
                tracing::debug!(
                    room = %code,
                    player_id = %player_id,
                    ?reason,
                    "Score event dropped"
                );
            },
        }
    }

    /// Send a directed `room:error` to one player.
    pub async fn send_error(&self, code: &str, player_id: PlayerId, error: RoomError) {
        let Some(shared) = self.lookup(code).await else {
            return;
        };
        let room = shared.lock().await;
        broadcast::emit_to_player(
            &room,
            player_id,
            &ServerMessage::RoomError(RoomErrorMsg::from_error(error)),
        );
    }

    /// Explicit leave: remove immediately, no grace window.
    pub async fn leave(&self, code: &str, player_id: PlayerId) {
        let Some(shared) = self.lookup(code).await else {
            return;
        };
        let mut room = shared.lock().await;
        if room.remove_player(player_id).is_none() {
            return;
        }
        tracing::info!(room = %code, player_id = %player_id, "Player left");

        if room.is_empty() {
            room.clock.cancel_all();
            drop(room);
            self.remove_room(code).await;
            return;
        }
        broadcast::emit_to_room(&room, &ServerMessage::PlayerLeft(PlayerRefMsg { player_id }));
        broadcast::emit_to_room(&room, &ServerMessage::PlayersSync(room.sync_msg()));
    }

    /// Transport loss: retain the player and score, start the grace timer.
    pub async fn disconnect(self: &Arc<Self>, code: &str, player_id: PlayerId) {
        let Some(shared) = self.lookup(code).await else {
            return;
        };
        let mut room = shared.lock().await;
        if !room.mark_disconnected(player_id) {
            return;
        }
        let window = room.config.grace_window;
        tracing::info!(
            room = %code,
            player_id = %player_id,
            grace_ms = window.as_millis() as u64,
            "Player disconnected, grace window started"
        );

        broadcast::emit_to_room(
            &room,
            &ServerMessage::PlayerDisconnected(PlayerRefMsg { player_id }),
        );
        let handle =
            clock::schedule_grace_expiry(Arc::clone(self), code.to_string(), player_id, window);
        room.clock.set_grace(player_id, handle);
    }

    /// Countdown timer callback: STARTING → ACTIVE at the shared anchor.
    pub async fn on_countdown_expired(self: &Arc<Self>, code: &str) {
        let Some(shared) = self.lookup(code).await else {
            return;
        };
        let mut room = shared.lock().await;
        if room.phase != RoomPhase::Starting {
            return;
        }
        let Some(start_at) = room.start_at else {
            return;
        };
        room.transition(RoomPhase::Active);
        tracing::info!(room = %code, "Game started");

        broadcast::emit_to_room(
            &room,
            &ServerMessage::StateChanged(StateChangedMsg {
                phase: RoomPhase::Active,
            }),
        );
        broadcast::emit_to_room(&room, &ServerMessage::GameStarted);

        let end_at = start_at + room.config.game_duration.as_millis() as u64;
        let handle = clock::schedule_game_over(Arc::clone(self), code.to_string(), end_at);
        room.clock.set_game_over(handle);
    }

    /// Duration timer callback: ACTIVE → FINISHED. The only path that ends
    /// a round; no client message can shorten or extend it.
    pub async fn on_game_over(self: &Arc<Self>, code: &str) {
        let Some(shared) = self.lookup(code).await else {
            return;
        };
        let mut room = shared.lock().await;
        if room.phase != RoomPhase::Active {
            return;
        }
        let leaderboard = room.finish();
        tracing::info!(room = %code, players = leaderboard.len(), "Game finished");

        broadcast::emit_to_room(
            &room,
            &ServerMessage::StateChanged(StateChangedMsg {
                phase: RoomPhase::Finished,
            }),
        );
        broadcast::emit_to_room(
            &room,
            &ServerMessage::GameFinished(GameFinishedMsg { leaderboard }),
        );

        let reset_at = now_millis() + room.config.lobby_return_delay.as_millis() as u64;
        let handle = clock::schedule_lobby_return(Arc::clone(self), code.to_string(), reset_at);
        room.clock.set_lobby_return(handle);
    }

    /// Post-game timer callback: FINISHED → fresh LOBBY, or teardown when
    /// nobody is left.
    pub async fn on_lobby_return(self: &Arc<Self>, code: &str) {
        let Some(shared) = self.lookup(code).await else {
            return;
        };
        let mut room = shared.lock().await;
        if room.phase != RoomPhase::Finished {
            return;
        }
        if room.is_empty() {
            room.clock.cancel_all();
            drop(room);
            self.remove_room(code).await;
            return;
        }
        room.reset_to_lobby();
        tracing::info!(room = %code, "Room reset to lobby");

        broadcast::emit_to_room(
            &room,
            &ServerMessage::StateChanged(StateChangedMsg {
                phase: RoomPhase::Lobby,
            }),
        );
        broadcast::emit_to_room(&room, &ServerMessage::PlayersSync(room.sync_msg()));
    }

    /// Grace timer callback: the disconnected player never came back.
    pub async fn on_grace_expired(self: &Arc<Self>, code: &str, player_id: PlayerId) {
        let Some(shared) = self.lookup(code).await else {
            return;
        };
        let mut room = shared.lock().await;
        match room.player(player_id) {
            Some(p) if !p.connected => {},
            // Reconnected in time, or already removed
            _ => return,
        }
        room.remove_player(player_id);
        tracing::info!(room = %code, player_id = %player_id, "Grace window elapsed, player removed");

        if room.is_empty() {
            room.clock.cancel_all();
            drop(room);
            self.remove_room(code).await;
            return;
        }
        broadcast::emit_to_room(&room, &ServerMessage::PlayerLeft(PlayerRefMsg { player_id }));
        broadcast::emit_to_room(&room, &ServerMessage::PlayersSync(room.sync_msg()));
    }

    /// Delete a room and cancel its pending timers.
    pub async fn remove_room(&self, code: &str) {
        let Some(shared) = self.rooms.write().await.remove(code) else {
            return;
        };
        shared.lock().await.clock.cancel_all();
        tracing::info!(room = %code, "Room removed");
    }

    /// Active room and player counts, for the health endpoint.
    pub async fn stats(&self) -> (usize, usize) {
        let rooms = self.rooms.read().await;
        let mut players = 0;
        for shared in rooms.values() {
            players += shared.lock().await.players.len();
        }
        (rooms.len(), players)
    }

    /// Remove rooms idle for longer than `max_idle`. Returns the number
    /// removed.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<String> = {
            let rooms = self.rooms.read().await;
            let mut stale = Vec::new();
            for (code, shared) in rooms.iter() {
                if shared.lock().await.last_activity.elapsed() > max_idle {
                    stale.push(code.clone());
                }
            }
            stale
        };
        for code in &stale {
            tracing::info!(room = %code, "Removing idle room");
            self.remove_room(code).await;
        }
        stale.len()
    }

    /// Shutdown path: cancel every timer and drop every room.
    pub async fn drain(&self) {
        let mut rooms = self.rooms.write().await;
        let count = rooms.len();
        for (_, shared) in rooms.drain() {
            shared.lock().await.clock.cancel_all();
        }
        if count > 0 {
            tracing::info!(rooms = count, "Drained active rooms");
        }
    }
}
