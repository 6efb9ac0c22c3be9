use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};

/// One row of the final ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: u32,
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
}

/// Build the final ranking: score descending, ties broken by `joined_at`
/// ascending (earliest joiner ranks higher). Called once at the FINISHED
/// transition; the result is a frozen snapshot.
pub fn build(players: &[Player]) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&Player> = players.iter().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.joined_at.cmp(&b.joined_at)));
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i as u32 + 1,
            player_id: p.id,
            name: p.name.clone(),
            score: p.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_players;

    #[test]
    fn orders_by_score_descending() {
        let mut players = make_players(3);
        players[0].score = 10;
        players[1].score = 50;
        players[2].score = 30;

        let board = build(&players);
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].score, 50);
        assert_eq!(board[1].score, 30);
        assert_eq!(board[2].score, 10);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[2].rank, 3);
    }

    #[test]
    fn ties_broken_by_earliest_join() {
        // make_players assigns strictly increasing joined_at
        let mut players = make_players(3);
        players[0].score = 20;
        players[1].score = 20;
        players[2].score = 20;

        let board = build(&players);
        assert_eq!(board[0].player_id, players[0].id);
        assert_eq!(board[1].player_id, players[1].id);
        assert_eq!(board[2].player_id, players[2].id);
    }

    #[test]
    fn zero_score_players_included() {
        let mut players = make_players(2);
        players[1].score = 50;

        let board = build(&players);
        assert_eq!(board[0].score, 50);
        assert_eq!(board[1].score, 0);
        assert_eq!(board[1].player_id, players[0].id);
    }

    #[test]
    fn empty_room_empty_board() {
        assert!(build(&[]).is_empty());
    }
}
