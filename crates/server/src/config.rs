use std::time::Duration;

use realm::{DEFAULT_TICK_RATE, GameSettings, MapId};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub max_clients: usize,
    /// Silence after which a peer is dropped.
    pub timeout: Duration,
    /// Reliable frames unacked this long are sent again.
    pub resend_interval: Duration,
    pub start_map: MapId,
}

impl ServerConfig {
    /// Game settings with the server's overrides applied.
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            start_map: self.start_map,
            ..GameSettings::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_clients: 64,
            timeout: Duration::from_secs(30),
            resend_interval: Duration::from_millis(200),
            start_map: GameSettings::default().start_map,
        }
    }
}
