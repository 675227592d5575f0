//! Main application configuration
//!
//! This module defines the primary configuration structures for the trivia-duel
//! service, including TOML file loading, environment variable loading and
//! validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub matchmaking: MatchmakingSettings,
    pub storage: StorageSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind to
    pub host: String,
    /// Port serving the game API, push socket, health and metrics
    pub http_port: u16,
}

/// Bearer credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Shared HMAC secret used to verify player tokens
    pub token_secret: String,
    /// Create a player record on first authenticated contact
    pub auto_register_players: bool,
}

/// Matchmaking and session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Interval of the sweep that finalizes completed sessions
    pub finalization_sweep_interval_seconds: u64,
    /// Sessions examined per sweep tick
    pub finalization_batch_size: usize,
    /// Retries on optimistic player-store conflicts
    pub max_version_retries: u32,
    /// Interval of the gauge refresh task
    pub metrics_interval_seconds: u64,
    /// How long an uncollected match notice is kept for its player
    pub match_notice_ttl_seconds: u64,
}

/// Storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON seed file for the question bank
    pub question_bank_path: Option<PathBuf>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "trivia-duel".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_secret: "change-me-in-production".to_string(),
            auto_register_players: true,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            finalization_sweep_interval_seconds: 15,
            finalization_batch_size: 100,
            max_version_retries: 5,
            metrics_interval_seconds: 30,
            match_notice_ttl_seconds: 300,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file; missing keys fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Server settings
        if let Ok(host) = env::var("HTTP_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            config.server.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }

        // Auth settings
        if let Ok(secret) = env::var("TOKEN_SECRET") {
            config.auth.token_secret = secret;
        }
        if let Ok(auto_register) = env::var("AUTO_REGISTER_PLAYERS") {
            config.auth.auto_register_players = auto_register
                .parse()
                .map_err(|_| anyhow!("Invalid AUTO_REGISTER_PLAYERS value: {}", auto_register))?;
        }

        // Matchmaking settings
        if let Ok(interval) = env::var("FINALIZATION_SWEEP_INTERVAL_SECONDS") {
            config.matchmaking.finalization_sweep_interval_seconds =
                interval.parse().map_err(|_| {
                    anyhow!("Invalid FINALIZATION_SWEEP_INTERVAL_SECONDS value: {}", interval)
                })?;
        }
        if let Ok(batch) = env::var("FINALIZATION_BATCH_SIZE") {
            config.matchmaking.finalization_batch_size = batch
                .parse()
                .map_err(|_| anyhow!("Invalid FINALIZATION_BATCH_SIZE value: {}", batch))?;
        }
        if let Ok(retries) = env::var("MAX_VERSION_RETRIES") {
            config.matchmaking.max_version_retries = retries
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_VERSION_RETRIES value: {}", retries))?;
        }
        if let Ok(interval) = env::var("METRICS_INTERVAL_SECONDS") {
            config.matchmaking.metrics_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid METRICS_INTERVAL_SECONDS value: {}", interval))?;
        }

        if let Ok(ttl) = env::var("MATCH_NOTICE_TTL_SECONDS") {
            config.matchmaking.match_notice_ttl_seconds = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid MATCH_NOTICE_TTL_SECONDS value: {}", ttl))?;
        }

        // Storage settings
        if let Ok(path) = env::var("QUESTION_BANK_PATH") {
            config.storage.question_bank_path = Some(PathBuf::from(path));
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get finalization sweep interval as Duration
    pub fn finalization_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.finalization_sweep_interval_seconds)
    }

    /// Get metrics refresh interval as Duration
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.metrics_interval_seconds)
    }

    /// Get match notice lifetime as Duration
    pub fn match_notice_ttl(&self) -> Duration {
        Duration::from_secs(self.matchmaking.match_notice_ttl_seconds)
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.server.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.server.host.is_empty() {
        return Err(anyhow!("HTTP host cannot be empty"));
    }

    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.auth.token_secret.is_empty() {
        return Err(anyhow!("Token secret cannot be empty"));
    }

    if config.matchmaking.finalization_sweep_interval_seconds == 0 {
        return Err(anyhow!("Finalization sweep interval must be greater than 0"));
    }
    if config.matchmaking.finalization_batch_size == 0 {
        return Err(anyhow!("Finalization batch size must be greater than 0"));
    }
    if config.matchmaking.metrics_interval_seconds == 0 {
        return Err(anyhow!("Metrics interval must be greater than 0"));
    }
    if config.matchmaking.match_notice_ttl_seconds == 0 {
        return Err(anyhow!("Match notice TTL must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.auth.auto_register_players);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            http_port = 9000

            [storage]
            question_bank_path = "seed/questions.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.http_port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.service.name, "trivia-duel");
        assert_eq!(
            config.storage.question_bank_path,
            Some(PathBuf::from("seed/questions.json"))
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.server.http_port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.auth.token_secret.clear();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.matchmaking.match_notice_ttl_seconds = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duration_getters() {
        let config = AppConfig::default();
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.finalization_sweep_interval(), Duration::from_secs(15));
        assert_eq!(config.metrics_interval(), Duration::from_secs(30));
        assert_eq!(config.match_notice_ttl(), Duration::from_secs(300));
    }
}
