use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::configs::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config.toml or config.default.toml not found")]
    NotFound,
    #[error("{0} is empty")]
    Empty(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = if Path::new("config.toml").exists() {
            "config.toml"
        } else if Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err(ConfigError::NotFound);
        };

        // the subscriber is not installed yet
        println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
            path: config_path.to_string(),
            source,
        })?;
        Self::parse(config_path, &config_str)
    }

    pub fn parse(origin: &str, raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::Empty(origin.to_string()));
        }
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = Config::parse("inline", "[server]\nport = 2444\n").unwrap();
        assert_eq!(config.server.port, 2444);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.player.player_update_interval_ms, 5000);
        assert_eq!(config.player.max_volume, 1000);
        assert!(config.filters.enabled);
        assert!(config.sources.http);
        assert!(!config.sources.local);
    }

    #[test]
    fn zero_intervals_disable_timers() {
        let raw = "[player]\nplayer_update_interval_ms = 0\nconnect_timeout_ms = 0\n";
        let config = Config::parse("inline", raw).unwrap();
        assert!(config.player.update_interval().is_none());
        assert!(config.player.connect_timeout().is_none());
    }

    #[test]
    fn filters_disabled_globally_disable_every_filter() {
        let raw = "[filters]\nenabled = false\n";
        let config = Config::parse("inline", raw).unwrap();
        assert!(!config.filters.is_enabled("volume"));
        assert!(!config.filters.is_enabled("timescale"));
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(matches!(
            Config::parse("config.toml", "  \n"),
            Err(ConfigError::Empty(_))
        ));
    }
}
