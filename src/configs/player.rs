use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    /// Cadence of `playerUpdate` ops while a track plays. 0 disables them.
    #[serde(default = "default_player_update_interval_ms")]
    pub player_update_interval_ms: u64,
    /// How long a play waits for the voice connection. 0 waits forever.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_max_volume")]
    pub max_volume: i32,
}

impl PlayerConfig {
    pub fn update_interval(&self) -> Option<Duration> {
        (self.player_update_interval_ms > 0)
            .then(|| Duration::from_millis(self.player_update_interval_ms))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            player_update_interval_ms: default_player_update_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_volume: default_max_volume(),
        }
    }
}

fn default_player_update_interval_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    15_000
}

fn default_max_volume() -> i32 {
    1000
}
