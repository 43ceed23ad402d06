//! Configuration with validation, defaults, and environment overrides.

use crate::game::types::Rarity;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashiqConfig {
    pub round: RoundConfig,
    pub weights: WeightsConfig,
    pub cases: CaseConfig,
    pub persistence: PersistenceConfig,
    pub api: ApiConfig,
}

/// Round lifecycle timing and crash-point range
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Maximum play phase length in milliseconds
    pub round_duration_ms: u64,
    /// Betting countdown before each round starts
    pub waiting_duration_ms: u64,
    /// Pause between a crash and the next round's countdown
    pub reset_delay_ms: u64,
    /// Scheduler tick granularity
    pub tick_interval_ms: u64,
    pub crash_point_min: f64,
    pub crash_point_max: f64,
    /// Bounded crash history length
    pub history_limit: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_duration_ms: 15_000,
            waiting_duration_ms: 10_000,
            reset_delay_ms: 3_000,
            tick_interval_ms: 100,
            crash_point_min: 1.5,
            crash_point_max: 5.0,
            history_limit: 10,
        }
    }
}

impl RoundConfig {
    /// Shortened timings for demos and integration tests.
    pub fn fast() -> Self {
        Self {
            round_duration_ms: 2_000,
            waiting_duration_ms: 1_000,
            reset_delay_ms: 500,
            tick_interval_ms: 50,
            ..Default::default()
        }
    }

    pub fn round_duration(&self) -> Duration {
        Duration::from_millis(self.round_duration_ms)
    }

    pub fn waiting_duration(&self) -> Duration {
        Duration::from_millis(self.waiting_duration_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Rarity weights for case opening. Unknown tiers fall back to `default`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub common: f64,
    pub uncommon: f64,
    pub rare: f64,
    pub epic: f64,
    pub legendary: f64,
    #[serde(rename = "default")]
    pub default_weight: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            common: 50.0,
            uncommon: 30.0,
            rare: 15.0,
            epic: 4.0,
            legendary: 1.0,
            default_weight: 10.0,
        }
    }
}

impl WeightsConfig {
    pub fn weight_for(&self, rarity: Rarity) -> f64 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Uncommon => self.uncommon,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
            Rarity::Unknown => self.default_weight,
        }
    }
}

/// Bounds for items drawn per case opening
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub min_per_open: usize,
    pub max_per_open: usize,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            min_per_open: 1,
            max_per_open: 5,
        }
    }
}

/// Bounded retry policy for store writes
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub max_retries: u32,
    /// First backoff; doubles on every retry
    pub retry_backoff_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 50,
        }
    }
}

impl PersistenceConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// HTTP server settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

impl CrashiqConfig {
    /// Configuration with shortened round timings for demos and tests.
    pub fn fast_rounds() -> Self {
        Self {
            round: RoundConfig::fast(),
            ..Default::default()
        }
    }

    /// Validate logical consistency before the engine starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round.round_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "round_duration_ms must be > 0".to_string(),
            ));
        }
        if self.round.waiting_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "waiting_duration_ms must be > 0".to_string(),
            ));
        }
        if self.round.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be > 0".to_string(),
            ));
        }
        if self.round.tick_interval_ms > self.round.round_duration_ms
            || self.round.tick_interval_ms > self.round.waiting_duration_ms
        {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must not exceed the round or waiting durations".to_string(),
            ));
        }
        if self.round.crash_point_min < 1.0 {
            return Err(ConfigError::Invalid(
                "crash_point_min must be at least 1.0".to_string(),
            ));
        }
        if self.round.crash_point_max < self.round.crash_point_min {
            return Err(ConfigError::Invalid(
                "crash_point_max must not be below crash_point_min".to_string(),
            ));
        }
        if self.round.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history_limit must be > 0".to_string(),
            ));
        }

        let weights = [
            self.weights.common,
            self.weights.uncommon,
            self.weights.rare,
            self.weights.epic,
            self.weights.legendary,
            self.weights.default_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(ConfigError::Invalid(
                "rarity weights must be positive and finite".to_string(),
            ));
        }

        if self.cases.min_per_open == 0 || self.cases.max_per_open < self.cases.min_per_open {
            return Err(ConfigError::Invalid(
                "case open bounds must satisfy 1 <= min <= max".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from an optional TOML file, applies `CRASHIQ_*`
/// environment overrides, then validates the result.
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn load(&self) -> Result<CrashiqConfig, ConfigError> {
        let mut config = if let Some(ref path) = self.config_path {
            Self::load_from_file(path)?
        } else {
            CrashiqConfig::default()
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> Result<CrashiqConfig, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Load(format!("failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(config: &mut CrashiqConfig) -> Result<(), ConfigError> {
        if let Ok(host) = env::var("CRASHIQ_API_HOST") {
            config.api.host = host;
        }
        if let Ok(port) = env::var("CRASHIQ_API_PORT") {
            config.api.port = Self::parse_env("CRASHIQ_API_PORT", port)?;
        }
        if let Ok(ms) = env::var("CRASHIQ_ROUND_DURATION_MS") {
            config.round.round_duration_ms = Self::parse_env("CRASHIQ_ROUND_DURATION_MS", ms)?;
        }
        if let Ok(ms) = env::var("CRASHIQ_WAITING_DURATION_MS") {
            config.round.waiting_duration_ms = Self::parse_env("CRASHIQ_WAITING_DURATION_MS", ms)?;
        }
        if let Ok(ms) = env::var("CRASHIQ_RESET_DELAY_MS") {
            config.round.reset_delay_ms = Self::parse_env("CRASHIQ_RESET_DELAY_MS", ms)?;
        }
        if let Ok(ms) = env::var("CRASHIQ_TICK_INTERVAL_MS") {
            config.round.tick_interval_ms = Self::parse_env("CRASHIQ_TICK_INTERVAL_MS", ms)?;
        }

        Ok(())
    }

    fn parse_env<T: std::str::FromStr>(field: &str, value: String) -> Result<T, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value,
            reason: "not a valid number".to_string(),
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CrashiqConfig::default().validate().is_ok());
    }

    #[test]
    fn test_fast_rounds_config_is_valid() {
        let config = CrashiqConfig::fast_rounds();
        assert!(config.validate().is_ok());
        assert_eq!(config.round.waiting_duration_ms, 1_000);
    }

    #[test]
    fn test_default_weights_match_rarity_table() {
        let weights = WeightsConfig::default();
        assert_eq!(weights.weight_for(Rarity::Common), 50.0);
        assert_eq!(weights.weight_for(Rarity::Uncommon), 30.0);
        assert_eq!(weights.weight_for(Rarity::Rare), 15.0);
        assert_eq!(weights.weight_for(Rarity::Epic), 4.0);
        assert_eq!(weights.weight_for(Rarity::Legendary), 1.0);
        assert_eq!(weights.weight_for(Rarity::Unknown), 10.0);
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut config = CrashiqConfig::default();
        config.round.round_duration_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_crash_range_rejected() {
        let mut config = CrashiqConfig::default();
        config.round.crash_point_min = 5.0;
        config.round.crash_point_max = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_weight_rejected() {
        let mut config = CrashiqConfig::default();
        config.weights.epic = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_coarser_than_round_rejected() {
        let mut config = CrashiqConfig::default();
        config.round.tick_interval_ms = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crashiq.toml");
        std::fs::write(
            &path,
            r#"
[round]
waiting_duration_ms = 4000

[weights]
common = 40.0
uncommon = 40.0
"#,
        )
        .unwrap();

        let config = ConfigLoader::new().with_path(&path).load().unwrap();
        assert_eq!(config.round.waiting_duration_ms, 4_000);
        assert_eq!(config.weights.common, 40.0);
        assert_eq!(config.weights.uncommon, 40.0);
        // untouched sections keep their defaults
        assert_eq!(config.round.round_duration_ms, 15_000);
        assert_eq!(config.weights.rare, 15.0);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crashiq.toml");
        std::fs::write(&path, "[round]\ncrash_point_min = 0.5\n").unwrap();

        assert!(ConfigLoader::new().with_path(&path).load().is_err());
    }

    #[test]
    fn test_env_overrides_applied() {
        env::set_var("CRASHIQ_API_PORT", "9099");
        let config = ConfigLoader::new().load().unwrap();
        env::remove_var("CRASHIQ_API_PORT");

        assert_eq!(config.api.port, 9_099);
    }
}
