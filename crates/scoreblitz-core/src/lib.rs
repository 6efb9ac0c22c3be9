pub mod error;
pub mod leaderboard;
pub mod net;
pub mod player;
pub mod room;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::Player;

    /// Create `n` test players with staggered `joined_at` timestamps.
    /// The first player is the host.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| {
                let mut p = Player::new(format!("Player{}", i + 1), i == 0, 1_000 + i as u64);
                p.connected = true;
                p
            })
            .collect()
    }
}
