use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::scoring::weights::ScoringConfig;
use crate::sport::Sport;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
    pub http: HttpConfig,
    pub odds_api: OddsApiConfig,
    pub espn: EspnConfig,
    pub nhl: NhlConfig,
    pub jobs: JobsConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    #[serde(default = "default_true")]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Linear backoff step: attempt `n` waits `n * retry_delay_ms`.
    pub retry_delay_ms: u64,
    pub requests_per_second: u32,
    pub burst_size: u32,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsApiConfig {
    pub base_url: String,
    pub regions: String,
    pub markets: Vec<String>,
    pub prop_markets: Vec<String>,
    pub sports: Vec<Sport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspnConfig {
    pub base_url: String,
    pub web_base_url: String,
    pub sports: Vec<Sport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NhlConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    pub default_days_back: u32,
    /// Upper bound on a requested `days_back`; each day is one scoreboard call per sport.
    #[serde(default = "default_max_days_back")]
    pub max_days_back: u32,
    /// Number of recent games averaged for archetype classification.
    pub archetype_games: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_days_back() -> u32 {
    14
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub odds_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            odds_api_key: std::env::var("ODDS_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

impl AppConfig {
    /// Load configuration from `SHARP_SIGNALS_CONFIG` (or config/default.toml),
    /// overlaying environment variables for secrets.
    pub fn load() -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("SHARP_SIGNALS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let config = Self::from_file(&config_path)?;
        let secrets = Secrets::from_env();

        Ok((config, secrets))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate().map_err(|errors| {
            anyhow!("Invalid config file {}: {}", path.display(), errors.join("; "))
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.jobs.default_days_back > self.jobs.max_days_back {
            errors.push("jobs.default_days_back must not exceed jobs.max_days_back".to_string());
        }
        if let Err(scoring) = self.scoring.validate() {
            errors.extend(scoring);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = AppConfig::from_file(Path::new(DEFAULT_CONFIG_PATH)).expect("should parse");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.http.max_retries, 2);
        assert_eq!(config.odds_api.sports, vec![Sport::Nba, Sport::Nhl, Sport::Nfl]);
        assert!(config.odds_api.markets.contains(&"spreads".to_string()));
        // No [scoring] section: every weight falls back to its default.
        assert_eq!(config.scoring.sharp.steam_bonus, 8.0);
    }

    #[test]
    fn test_scoring_section_overrides_defaults() {
        let mut contents = std::fs::read_to_string(DEFAULT_CONFIG_PATH).unwrap();
        contents.push_str("\n[scoring.sharp]\nsteam_bonus = 12.0\n");
        let config: AppConfig = toml::from_str(&contents).expect("should parse");
        assert_eq!(config.scoring.sharp.steam_bonus, 12.0);
        assert_eq!(config.scoring.sharp.consensus_weight, 15.0);
    }

    #[test]
    fn test_invalid_scoring_section_rejected() {
        let mut contents = std::fs::read_to_string(DEFAULT_CONFIG_PATH).unwrap();
        contents.push_str("\n[scoring.matchup]\nconfidence_floor = 99.0\n");
        let config: AppConfig = toml::from_str(&contents).expect("should parse");
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("confidence_floor"));
    }

    #[test]
    fn test_max_days_back_defaults_when_absent() {
        let contents = std::fs::read_to_string(DEFAULT_CONFIG_PATH)
            .unwrap()
            .replace("max_days_back = 14\n", "");
        let config: AppConfig = toml::from_str(&contents).expect("should parse");
        assert_eq!(config.jobs.max_days_back, 14);
        assert!(config.validate().is_ok());
    }
}
