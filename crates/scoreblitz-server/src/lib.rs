pub mod broadcast;
pub mod clock;
pub mod config;
pub mod health;
pub mod registry;
pub mod room;
pub mod score;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/healthz", axum::routing::get(health::health_check))
        .route("/readyz", axum::routing::get(health::readiness_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

/// Background task that periodically removes rooms with no recent activity.
pub fn spawn_idle_sweeper(state: AppState) {
    let interval = Duration::from_secs(state.config.rooms.sweep_interval_secs);
    let max_idle = Duration::from_secs(state.config.rooms.idle_timeout_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = state.registry.sweep_idle(max_idle).await;
            if removed > 0 {
                tracing::info!(removed, "Idle room sweep");
            }
        }
    });
}
