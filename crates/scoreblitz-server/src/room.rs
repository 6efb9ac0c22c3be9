use std::collections::HashMap;
use std::time::Instant;

use uuid::Uuid;

use scoreblitz_core::error::RoomError;
use scoreblitz_core::leaderboard::{self, LeaderboardEntry};
use scoreblitz_core::net::messages::{PlayersSyncMsg, RoomJoinedMsg};
use scoreblitz_core::player::{Player, PlayerId};
use scoreblitz_core::room::{RoomConfig, RoomPhase};
use scoreblitz_core::time::now_millis;

use crate::broadcast::PlayerSender;
use crate::clock::GameClock;

/// One game session: its players, phase, host, outbound channels, and the
/// timers scoped to it. All mutation happens under the room's async mutex
/// (see `RoomRegistry`).
pub struct Room {
    pub id: Uuid,
    pub code: String,
    pub phase: RoomPhase,
    /// Insertion order is meaningful: host fallback prefers earlier joiners,
    /// and `joined_at` tie-breaks the leaderboard.
    pub players: Vec<Player>,
    pub host_id: PlayerId,
    /// Absolute epoch-ms countdown anchor. Set only on LOBBY → STARTING.
    pub start_at: Option<u64>,
    pub config: RoomConfig,
    pub connections: HashMap<PlayerId, PlayerSender>,
    pub clock: GameClock,
    /// Frozen once at the ACTIVE → FINISHED transition, cleared on reset.
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
    pub last_activity: Instant,
}

impl Room {
    /// Create a room in LOBBY with `host` as its sole member.
    pub fn new(code: String, config: RoomConfig, host: Player, sender: PlayerSender) -> Self {
        let host_id = host.id;
        let mut connections = HashMap::new();
        connections.insert(host_id, sender);
        Self {
            id: Uuid::new_v4(),
            code,
            phase: RoomPhase::Lobby,
            players: vec![host],
            host_id,
            start_at: None,
            config,
            connections,
            clock: GameClock::default(),
            leaderboard: None,
            last_activity: Instant::now(),
        }
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Whether a new player may be admitted right now.
    pub fn can_join(&self) -> Result<(), RoomError> {
        if self.phase != RoomPhase::Lobby {
            return Err(RoomError::InvalidState);
        }
        if self.players.len() >= self.config.max_players as usize {
            return Err(RoomError::RoomFull);
        }
        Ok(())
    }

    /// Admit a validated player. Caller must have checked `can_join`.
    pub fn add_player(&mut self, player: Player, sender: PlayerSender) {
        self.connections.insert(player.id, sender);
        self.players.push(player);
        self.touch();
    }

    /// Apply a phase transition if it is legal. Illegal transitions are
    /// logged and rejected rather than corrupting the state machine.
    pub fn transition(&mut self, next: RoomPhase) -> bool {
        if self.phase.can_transition_to(next) {
            self.phase = next;
            true
        } else {
            tracing::warn!(
                room = %self.code,
                from = ?self.phase,
                to = ?next,
                "Invalid room phase transition"
            );
            false
        }
    }

    /// Host-only LOBBY → STARTING. Returns the absolute `start_at` anchor.
    pub fn begin_starting(&mut self, requester: PlayerId) -> Result<u64, RoomError> {
        if requester != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.phase != RoomPhase::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        let start_at = now_millis() + self.config.countdown.as_millis() as u64;
        self.transition(RoomPhase::Starting);
        self.start_at = Some(start_at);
        self.touch();
        Ok(start_at)
    }

    /// ACTIVE → FINISHED: freeze the leaderboard snapshot. Returns the
    /// ranking; late score events can never change it.
    pub fn finish(&mut self) -> Vec<LeaderboardEntry> {
        self.transition(RoomPhase::Finished);
        let board = leaderboard::build(&self.players);
        self.leaderboard = Some(board.clone());
        board
    }

    /// FINISHED → LOBBY: same membership, fresh session.
    pub fn reset_to_lobby(&mut self) {
        self.transition(RoomPhase::Lobby);
        self.start_at = None;
        self.leaderboard = None;
        for p in &mut self.players {
            p.score = 0;
        }
        self.clock.cancel_game_timers();
        self.touch();
    }

    /// Transport loss: keep the player and score, drop the channel.
    /// Returns false if the player is unknown or already marked.
    pub fn mark_disconnected(&mut self, player_id: PlayerId) -> bool {
        self.connections.remove(&player_id);
        match self.player_mut(player_id) {
            Some(p) if p.connected => {
                p.connected = false;
                true
            },
            _ => false,
        }
    }

    /// Rebind a reconnecting player to a new transport channel.
    pub fn rebind(&mut self, player_id: PlayerId, sender: PlayerSender) -> Result<(), RoomError> {
        let Some(player) = self.player_mut(player_id) else {
            return Err(RoomError::UnknownPlayer);
        };
        if player.connected {
            return Err(RoomError::AlreadyJoined);
        }
        player.connected = true;
        self.clock.cancel_grace(player_id);
        self.connections.insert(player_id, sender);
        self.touch();
        Ok(())
    }

    /// Remove a player permanently. The host role migrates to the
    /// earliest-joined remaining player, preferring connected ones.
    pub fn remove_player(&mut self, player_id: PlayerId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == player_id)?;
        let removed = self.players.remove(idx);
        self.connections.remove(&player_id);
        self.clock.cancel_grace(player_id);

        if removed.is_host && !self.players.is_empty() {
            let new_host = self
                .players
                .iter()
                .find(|p| p.connected)
                .unwrap_or(&self.players[0])
                .id;
            self.host_id = new_host;
            for p in &mut self.players {
                p.is_host = p.id == new_host;
            }
        }
        self.touch();
        Some(removed)
    }

    /// Full snapshot acknowledgment for a joining or reconnecting player.
    pub fn joined_ack(&self, player_id: PlayerId) -> RoomJoinedMsg {
        RoomJoinedMsg {
            success: true,
            room_id: Some(self.id),
            room_code: Some(self.code.clone()),
            player_id: Some(player_id),
            players: self.players.clone(),
            state: Some(self.phase),
            start_at: self.start_at,
            duration: Some(self.config.game_duration.as_millis() as u64),
            error: None,
        }
    }

    pub fn sync_msg(&self) -> PlayersSyncMsg {
        PlayersSyncMsg {
            players: self.players.clone(),
            host_id: self.host_id,
        }
    }
}
