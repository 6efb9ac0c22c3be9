use std::time::Duration;

use serde::Deserialize;

use scoreblitz_core::room::RoomConfig;

/// Top-level server configuration, loaded from `scoreblitz.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Maximum concurrent WebSocket connections per IP address.
    pub max_ws_per_ip: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
    /// Upper plausibility bound for a single score event's value.
    pub max_score_event_value: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            max_ws_per_ip: 10,
            ws_rate_limit_per_sec: 50.0,
            player_message_buffer: 256,
            max_score_event_value: 100,
        }
    }
}

/// Room lifecycle configuration. All game timing knobs live here so tests
/// can shrink them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub max_players: u8,
    pub countdown_ms: u64,
    pub game_duration_ms: u64,
    pub lobby_return_delay_ms: u64,
    pub grace_window_ms: u64,
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            countdown_ms: 3_000,
            game_duration_ms: 60_000,
            lobby_return_delay_ms: 8_000,
            grace_window_ms: 30_000,
            idle_timeout_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

impl RoomsConfig {
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            max_players: self.max_players,
            countdown: Duration::from_millis(self.countdown_ms),
            game_duration: Duration::from_millis(self.game_duration_ms),
            lobby_return_delay: Duration::from_millis(self.lobby_return_delay_ms),
            grace_window: Duration::from_millis(self.grace_window_ms),
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on values the server cannot run with.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_ws_per_ip == 0 {
            tracing::error!("limits.max_ws_per_ip must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_score_event_value == 0 {
            tracing::error!("limits.max_score_event_value must be > 0");
            std::process::exit(1);
        }

        if self.rooms.max_players == 0 {
            tracing::error!("rooms.max_players must be > 0");
            std::process::exit(1);
        }
        if self.rooms.countdown_ms == 0 {
            tracing::error!("rooms.countdown_ms must be > 0");
            std::process::exit(1);
        }
        if self.rooms.game_duration_ms == 0 {
            tracing::error!("rooms.game_duration_ms must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_timeout_secs == 0 {
            tracing::error!("rooms.idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.sweep_interval_secs == 0 {
            tracing::error!("rooms.sweep_interval_secs must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `scoreblitz.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("scoreblitz.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from scoreblitz.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse scoreblitz.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No scoreblitz.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("SCOREBLITZ_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(val) = std::env::var("SCOREBLITZ_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("SCOREBLITZ_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("SCOREBLITZ_GAME_DURATION_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rooms.game_duration_ms = n;
        }
        if let Ok(val) = std::env::var("SCOREBLITZ_GRACE_WINDOW_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rooms.grace_window_ms = n;
        }

        config
    }
}
