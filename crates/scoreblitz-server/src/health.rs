use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub rooms: RoomInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
}

#[derive(Serialize)]
pub struct RoomInfo {
    pub active: usize,
    pub players: usize,
}

/// Structured health check endpoint. Returns server status, connection counts,
/// and room info as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ws = state.ws_connection_count.load(Ordering::Relaxed);
    let (active_rooms, total_players) = state.registry.stats().await;

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket: ws },
        rooms: RoomInfo {
            active: active_rooms,
            players: total_players,
        },
    })
}

/// Readiness check. The registry exists from boot, so once the router is
/// serving we are ready.
pub async fn readiness_check(State(state): State<AppState>) -> &'static str {
    let _ = state.registry.stats().await;
    "ready"
}
