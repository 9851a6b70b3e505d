//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tournament tuning shared by the engine, scheduler and series runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Upper bound on matches executing at once
    #[serde(default = "default_max_parallel_matches")]
    pub max_parallel_matches: usize,

    /// Per-move timeout handed to the match executor
    #[serde(default = "default_move_timeout_ms")]
    pub move_timeout_ms: u64,

    /// Target participants per initial group
    #[serde(default = "default_group_size")]
    pub group_size: usize,

    /// Sudden-death attempts per pairing before a coin flip
    #[serde(default = "default_sudden_death_attempts")]
    pub sudden_death_max_attempts: u32,

    /// Seed for shuffles and coin flips (None = from entropy)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_parallel_matches() -> usize {
    8
}

fn default_move_timeout_ms() -> u64 {
    1000
}

fn default_group_size() -> usize {
    10
}

fn default_sudden_death_attempts() -> u32 {
    3
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            max_parallel_matches: default_max_parallel_matches(),
            move_timeout_ms: default_move_timeout_ms(),
            group_size: default_group_size(),
            sudden_death_max_attempts: default_sudden_death_attempts(),
            seed: None,
        }
    }
}

impl TournamentConfig {
    pub fn move_timeout(&self) -> Duration {
        Duration::from_millis(self.move_timeout_ms)
    }

    /// Number of initial groups for `participant_count` entrants.
    pub fn group_count(&self, participant_count: usize) -> usize {
        (participant_count / self.group_size.max(1)).max(1)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel_matches == 0 {
            return Err(ConfigError::ValidationError(
                "max_parallel_matches must be at least 1".to_string(),
            ));
        }

        if self.move_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "move timeout must be greater than 0".to_string(),
            ));
        }

        if self.group_size < 2 {
            return Err(ConfigError::ValidationError(
                "group_size must be at least 2".to_string(),
            ));
        }

        if self.sudden_death_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "sudden_death_max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Series configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Game types played in order
    #[serde(default = "default_game_types")]
    pub game_types: Vec<String>,
}

fn default_game_types() -> Vec<String> {
    vec!["rpsls".to_string(), "colonel-blotto".to_string()]
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            game_types: default_game_types(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSONL file receiving every recorded match
    #[serde(default)]
    pub results_path: Option<PathBuf>,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub tournament: TournamentConfig,

    #[serde(default)]
    pub series: SeriesConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tournament: TournamentConfig::default(),
            series: SeriesConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tournament.validate()?;

        if self.series.game_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one game type is required".to_string(),
            ));
        }

        Ok(())
    }
}
