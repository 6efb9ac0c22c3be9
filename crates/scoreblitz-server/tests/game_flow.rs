#[allow(dead_code)]
mod common;

use std::time::Duration;

use common::{
    TestServer, ws_connect, ws_create_room, ws_join_room, ws_reconnect, ws_score, ws_send,
    ws_try_read, ws_wait_for,
};
use scoreblitz_core::error::RoomError;
use scoreblitz_core::net::messages::{ClientMessage, ServerMessage};
use scoreblitz_core::room::RoomPhase;
use scoreblitz_core::time::now_millis;
use uuid::Uuid;

/// The whole timed lifecycle, driven only by the host's start request and
/// the server's own timers: LOBBY, STARTING, ACTIVE, FINISHED, back to LOBBY.
#[tokio::test]
async fn full_game_lifecycle() {
    let server = TestServer::with_fast_timers().await;

    let mut host = ws_connect(&server.ws_url()).await;
    let ack = ws_create_room(&mut host, "Alice").await;
    let code = ack.room_code.unwrap();
    let alice = ack.player_id.unwrap();

    let mut client = ws_connect(&server.ws_url()).await;
    let bob = ws_join_room(&mut client, &code, "Bob")
        .await
        .player_id
        .unwrap();

    ws_send(&mut host, &ClientMessage::StartGame).await;

    // Both clients observe STARTING and the same absolute countdown anchor
    let host_starting = ws_wait_for(&mut host, |m| match m {
        ServerMessage::GameStarting(g) => Some(g),
        _ => None,
    })
    .await;
    let client_starting = ws_wait_for(&mut client, |m| match m {
        ServerMessage::GameStarting(g) => Some(g),
        _ => None,
    })
    .await;
    assert_eq!(host_starting.start_at, client_starting.start_at);
    assert_eq!(host_starting.duration, 300);
    assert!(host_starting.start_at > now_millis() - 1_000);

    // Countdown elapses on the server
    let state = ws_wait_for(&mut client, |m| match m {
        ServerMessage::StateChanged(s) if s.phase == RoomPhase::Active => Some(s),
        _ => None,
    })
    .await;
    assert_eq!(state.phase, RoomPhase::Active);
    ws_wait_for(&mut client, |m| match m {
        ServerMessage::GameStarted => Some(()),
        _ => None,
    })
    .await;

    // Bob scores five times; both clients watch the running total
    for _ in 0..5 {
        ws_score(&mut client, 10).await;
    }
    for expected in [10u32, 20, 30, 40, 50] {
        let update = ws_wait_for(&mut host, |m| match m {
            ServerMessage::ScoreUpdate(u) => Some(u),
            _ => None,
        })
        .await;
        assert_eq!(update.player_id, bob);
        assert_eq!(update.score, expected);
    }

    // The duration timer ends the game with a frozen, ranked leaderboard
    let finished = ws_wait_for(&mut host, |m| match m {
        ServerMessage::GameFinished(f) => Some(f),
        _ => None,
    })
    .await;
    assert_eq!(finished.leaderboard.len(), 2);
    assert_eq!(finished.leaderboard[0].rank, 1);
    assert_eq!(finished.leaderboard[0].player_id, bob);
    assert_eq!(finished.leaderboard[0].score, 50);
    assert_eq!(finished.leaderboard[1].rank, 2);
    assert_eq!(finished.leaderboard[1].player_id, alice);
    assert_eq!(finished.leaderboard[1].score, 0);

    // After the return delay the room is a fresh lobby with zeroed scores
    ws_wait_for(&mut host, |m| match m {
        ServerMessage::StateChanged(s) if s.phase == RoomPhase::Lobby => Some(()),
        _ => None,
    })
    .await;
    let sync = ws_wait_for(&mut host, |m| match m {
        ServerMessage::PlayersSync(s) => Some(s),
        _ => None,
    })
    .await;
    assert_eq!(sync.players.len(), 2);
    assert!(sync.players.iter().all(|p| p.score == 0));

    // The same host can start another round
    ws_send(&mut host, &ClientMessage::StartGame).await;
    ws_wait_for(&mut client, |m| match m {
        ServerMessage::GameStarting(g) => Some(g),
        _ => None,
    })
    .await;
}

#[tokio::test]
async fn non_host_cannot_start() {
    let server = TestServer::with_fast_timers().await;

    let mut host = ws_connect(&server.ws_url()).await;
    let code = ws_create_room(&mut host, "Alice").await.room_code.unwrap();

    let mut client = ws_connect(&server.ws_url()).await;
    ws_join_room(&mut client, &code, "Bob").await;

    ws_send(&mut client, &ClientMessage::StartGame).await;
    let err = ws_wait_for(&mut client, |m| match m {
        ServerMessage::RoomError(e) => Some(e),
        _ => None,
    })
    .await;
    assert_eq!(err.error, RoomError::NotHost);
}

#[tokio::test]
async fn start_twice_rejected() {
    let server = TestServer::with_fast_timers().await;

    let mut host = ws_connect(&server.ws_url()).await;
    ws_create_room(&mut host, "Alice").await;

    ws_send(&mut host, &ClientMessage::StartGame).await;
    ws_send(&mut host, &ClientMessage::StartGame).await;

    let err = ws_wait_for(&mut host, |m| match m {
        ServerMessage::RoomError(e) => Some(e),
        _ => None,
    })
    .await;
    assert_eq!(err.error, RoomError::AlreadyStarted);
}

#[tokio::test]
async fn join_rejected_after_start() {
    let server = TestServer::with_fast_timers().await;

    let mut host = ws_connect(&server.ws_url()).await;
    let code = ws_create_room(&mut host, "Alice").await.room_code.unwrap();

    ws_send(&mut host, &ClientMessage::StartGame).await;
    ws_wait_for(&mut host, |m| match m {
        ServerMessage::GameStarting(g) => Some(g),
        _ => None,
    })
    .await;

    let mut client = ws_connect(&server.ws_url()).await;
    let joined = ws_join_room(&mut client, &code, "Bob").await;
    assert!(!joined.success);
    assert_eq!(joined.error, Some(RoomError::InvalidState));
}

#[tokio::test]
async fn scores_during_countdown_are_dropped() {
    let server = TestServer::with_fast_timers().await;

    let mut host = ws_connect(&server.ws_url()).await;
    ws_create_room(&mut host, "Alice").await;

    ws_send(&mut host, &ClientMessage::StartGame).await;
    ws_wait_for(&mut host, |m| match m {
        ServerMessage::GameStarting(g) => Some(g),
        _ => None,
    })
    .await;

    // Still STARTING (100 ms countdown)
    ws_score(&mut host, 10).await;

    ws_wait_for(&mut host, |m| match m {
        ServerMessage::GameStarted => Some(()),
        _ => None,
    })
    .await;
    ws_score(&mut host, 7).await;
    let update = ws_wait_for(&mut host, |m| match m {
        ServerMessage::ScoreUpdate(u) => Some(u),
        _ => None,
    })
    .await;
    // Only the in-game event counted
    assert_eq!(update.score, 7);
}

#[tokio::test]
async fn disconnect_and_reconnect_keeps_score() {
    let server = TestServer::with_fast_timers().await;

    let mut host = ws_connect(&server.ws_url()).await;
    let ack = ws_create_room(&mut host, "Alice").await;
    let code = ack.room_code.unwrap();

    let mut client = ws_connect(&server.ws_url()).await;
    let bob = ws_join_room(&mut client, &code, "Bob")
        .await
        .player_id
        .unwrap();

    ws_send(&mut host, &ClientMessage::StartGame).await;
    ws_wait_for(&mut client, |m| match m {
        ServerMessage::GameStarted => Some(()),
        _ => None,
    })
    .await;

    ws_score(&mut client, 30).await;
    ws_wait_for(&mut host, |m| match m {
        ServerMessage::ScoreUpdate(u) if u.score == 30 => Some(u),
        _ => None,
    })
    .await;

    // Transport drops without a leave
    drop(client);
    let gone = ws_wait_for(&mut host, |m| match m {
        ServerMessage::PlayerDisconnected(p) => Some(p),
        _ => None,
    })
    .await;
    assert_eq!(gone.player_id, bob);

    // Reconnect within the grace window with the old identity
    let mut rejoined = ws_connect(&server.ws_url()).await;
    let snapshot = ws_reconnect(&mut rejoined, &code, bob).await;
    assert!(snapshot.success);
    let me = snapshot.players.iter().find(|p| p.id == bob).unwrap();
    assert!(me.connected);
    assert_eq!(me.score, 30);

    let back = ws_wait_for(&mut host, |m| match m {
        ServerMessage::PlayerReconnected(p) => Some(p),
        _ => None,
    })
    .await;
    assert_eq!(back.player_id, bob);

    // The rebound connection scores again on the same total
    ws_score(&mut rejoined, 5).await;
    let update = ws_wait_for(&mut host, |m| match m {
        ServerMessage::ScoreUpdate(u) => Some(u),
        _ => None,
    })
    .await;
    assert_eq!(update.score, 35);
}

#[tokio::test]
async fn grace_expiry_removes_player() {
    let server = TestServer::with_fast_timers().await; // 200 ms grace

    let mut host = ws_connect(&server.ws_url()).await;
    let code = ws_create_room(&mut host, "Alice").await.room_code.unwrap();

    let mut client = ws_connect(&server.ws_url()).await;
    let bob = ws_join_room(&mut client, &code, "Bob")
        .await
        .player_id
        .unwrap();

    drop(client);
    ws_wait_for(&mut host, |m| match m {
        ServerMessage::PlayerDisconnected(p) => Some(p),
        _ => None,
    })
    .await;

    let left = ws_wait_for(&mut host, |m| match m {
        ServerMessage::PlayerLeft(p) => Some(p),
        _ => None,
    })
    .await;
    assert_eq!(left.player_id, bob);

    let sync = ws_wait_for(&mut host, |m| match m {
        ServerMessage::PlayersSync(s) => Some(s),
        _ => None,
    })
    .await;
    assert_eq!(sync.players.len(), 1);

    // The slot is free again
    let mut third = ws_connect(&server.ws_url()).await;
    assert!(ws_join_room(&mut third, &code, "Cara").await.success);
}

#[tokio::test]
async fn reconnect_with_unknown_identity_rejected() {
    let server = TestServer::with_fast_timers().await;

    let mut host = ws_connect(&server.ws_url()).await;
    let code = ws_create_room(&mut host, "Alice").await.room_code.unwrap();

    let mut stranger = ws_connect(&server.ws_url()).await;
    let snapshot = ws_reconnect(&mut stranger, &code, Uuid::new_v4()).await;
    assert!(!snapshot.success);
    assert_eq!(snapshot.error, Some(RoomError::UnknownPlayer));
}

#[tokio::test]
async fn reconnect_while_still_connected_rejected() {
    let server = TestServer::with_fast_timers().await;

    let mut host = ws_connect(&server.ws_url()).await;
    let ack = ws_create_room(&mut host, "Alice").await;
    let code = ack.room_code.unwrap();
    let alice = ack.player_id.unwrap();

    let mut dupe = ws_connect(&server.ws_url()).await;
    let snapshot = ws_reconnect(&mut dupe, &code, alice).await;
    assert!(!snapshot.success);
    assert_eq!(snapshot.error, Some(RoomError::AlreadyJoined));
}

#[tokio::test]
async fn oversized_score_value_is_dropped() {
    let server = TestServer::with_fast_timers().await;

    let mut host = ws_connect(&server.ws_url()).await;
    ws_create_room(&mut host, "Alice").await;

    ws_send(&mut host, &ClientMessage::StartGame).await;
    ws_wait_for(&mut host, |m| match m {
        ServerMessage::GameStarted => Some(()),
        _ => None,
    })
    .await;

    // Default plausibility cap is 100 per event
    ws_score(&mut host, 10_000).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        ws_try_read(&mut host, 100).await,
        None | Some(ServerMessage::StateChanged(_))
    ));
}
