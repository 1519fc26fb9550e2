use serde::{Deserialize, Serialize};
use skirmish_core::engine::BotTuning;
use skirmish_core::logic::spawn::SPAWN_SLOT_COUNT;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Smallest map on which every spawn slot and its formation fit apart.
pub const MIN_MAP_SIZE: u32 = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BotConfig {
    /// Pair a lone queued player with a bot when the matchmaking timeout fires.
    pub enabled: bool,
    pub tick_ms: u64,
    /// Minimum gap between two accepted orders for the same bot unit.
    pub cooldown_ms: u64,
    #[serde(flatten)]
    pub tuning: BotTuning,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_ms: 1_000,
            cooldown_ms: 2_500,
            tuning: BotTuning::default(),
        }
    }
}

impl BotConfig {
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub map_size: u32,
    /// Fixed map seed; random per session when unset.
    pub map_seed: Option<u64>,
    pub max_players_per_session: usize,
    pub matchmaking_timeout_ms: u64,
    /// Minimum gap between two accepted commands from the same sender.
    pub command_interval_ms: u64,
    pub idle_session_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
    pub bot: BotConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            map_size: 128,
            map_seed: None,
            max_players_per_session: 6,
            matchmaking_timeout_ms: 10_000,
            command_interval_ms: 100,
            idle_session_timeout_secs: 3_600,
            cleanup_interval_secs: 300,
            bot: BotConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_size < MIN_MAP_SIZE {
            return Err(ConfigError::Invalid(format!(
                "mapSize must be at least {MIN_MAP_SIZE}, got {}",
                self.map_size
            )));
        }
        if !(2..=SPAWN_SLOT_COUNT).contains(&self.max_players_per_session) {
            return Err(ConfigError::Invalid(format!(
                "maxPlayersPerSession must be between 2 and {SPAWN_SLOT_COUNT}, got {}",
                self.max_players_per_session
            )));
        }
        if self.bot.tick_ms == 0 {
            return Err(ConfigError::Invalid("bot.tickMs must be positive".into()));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "cleanupIntervalSecs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub const fn matchmaking_timeout(&self) -> Duration {
        Duration::from_millis(self.matchmaking_timeout_ms)
    }

    pub const fn command_interval(&self) -> Duration {
        Duration::from_millis(self.command_interval_ms)
    }

    pub const fn idle_session_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_session_timeout_secs)
    }

    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
