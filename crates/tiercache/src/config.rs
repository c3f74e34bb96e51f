//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tiercache_core::{
    DYNAMIC_TIER, EngineConfig, Favorability, RuleConfig, TierConfig, default_rules,
    default_tiers,
};
use tracing::info;
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Cache tiers, in declaration order
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
    /// Classifier rules, first match wins
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub favorability: FavorabilityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Cache engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Global byte budget across all tiers
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
    #[serde(default = "default_prefetch_threshold")]
    pub prefetch_threshold: f64,
    #[serde(default = "default_recent_access_capacity")]
    pub recent_access_capacity: usize,
    #[serde(default = "default_transition_window_secs")]
    pub transition_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// The host's own origin; requests to any other origin are cross-origin
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default = "default_tier")]
    pub default_tier: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Sqlite,
    Memory,
}

/// Blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// SQLite database file
    #[serde(default = "default_storage_path")]
    pub path: String,
}

/// Upstream fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub skip_tls_verify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FavorabilityConfig {
    /// Favorability until the external updater sets one
    #[serde(default)]
    pub initial: Favorability,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            classifier: ClassifierConfig::default(),
            tiers: default_tiers(),
            rules: default_rules(),
            storage: StorageConfig::default(),
            upstream: UpstreamConfig::default(),
            favorability: FavorabilityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            prefetch_threshold: default_prefetch_threshold(),
            recent_access_capacity: default_recent_access_capacity(),
            transition_window_secs: default_transition_window_secs(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            origin: None,
            default_tier: default_tier(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            path: default_storage_path(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
            skip_tls_verify: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_size() -> u64 {
    50 * 1024 * 1024 // 50 MB
}

fn default_maintenance_interval_secs() -> u64 {
    3600
}

fn default_prefetch_threshold() -> f64 {
    0.3
}

fn default_recent_access_capacity() -> usize {
    100
}

fn default_transition_window_secs() -> u64 {
    30
}

fn default_tier() -> String {
    DYNAMIC_TIER.to_string()
}

fn default_storage_path() -> String {
    "./data/tiercache.db".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build the engine configuration
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let origin = self
            .classifier
            .origin
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("Invalid classifier origin")?;

        let config = EngineConfig {
            tiers: self.tiers.clone(),
            rules: self.rules.clone(),
            default_tier: self.classifier.default_tier.clone(),
            origin,
            max_size: self.cache.max_size,
            prefetch_threshold: self.cache.prefetch_threshold,
            recent_access_capacity: self.cache.recent_access_capacity,
            transition_window_secs: self.cache.transition_window_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.cache.maintenance_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tiercache_core::{RuleKind, Strategy};

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/tiercache.toml").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.tiers.len(), 3);
        assert_eq!(config.storage.backend, StorageBackendKind::Sqlite);
        assert!(config.engine_config().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [server]
            port = 9090

            [cache]
            prefetch_threshold = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.cache.prefetch_threshold, 0.5);
        assert_eq!(config.cache.max_size, 50 * 1024 * 1024);
        assert_eq!(config.favorability.initial, Favorability::Medium);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_custom_tiers_and_rules() {
        let config = Config::parse(
            r#"
            [classifier]
            origin = "https://app.example.com"
            default_tier = "pages"

            [[tiers]]
            name = "pages"
            strategy = "stale-while-revalidate"
            max_age_secs = 60
            max_entries = 10

            [[tiers]]
            name = "remote"
            strategy = "network-only"
            max_age_secs = 0
            max_entries = 0

            [[rules]]
            tier = "remote"
            kind = "cross-origin"

            [storage]
            backend = "memory"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.rules[0].kind, RuleKind::CrossOrigin);

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.tiers[1].strategy, Strategy::NetworkOnly);
        assert_eq!(
            engine.origin.as_ref().map(|u| u.as_str()),
            Some("https://app.example.com/")
        );
    }

    #[test]
    fn test_unknown_rule_tier_is_rejected() {
        let config = Config::parse(
            r#"
            [[rules]]
            tier = "nowhere"
            kind = "prefix"
            pattern = "/x/"
            "#,
        )
        .unwrap();
        assert!(config.engine_config().is_err());
    }

    #[test]
    fn test_never_expiring_tier() {
        let config = Config::parse(
            r#"
            rules = []

            [classifier]
            default_tier = "forever"

            [[tiers]]
            name = "forever"
            strategy = "cache-first"
            max_age_secs = 10000000000000000
            max_entries = 10
            "#,
        )
        .unwrap();

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.tiers[0].max_age(), chrono::Duration::MAX);
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        let mut config = Config::default();
        config.classifier.origin = Some("not a url".to_string());
        assert!(config.engine_config().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[favorability]\ninitial = \"high\"").unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.favorability.initial, Favorability::High);
    }

    #[test]
    fn test_bundled_default_config() {
        let config = Config::parse(include_str!("../../../config/default.toml")).unwrap();
        let engine = config.engine_config().unwrap();
        assert_eq!(engine.tiers, default_tiers());
        assert_eq!(engine.rules.len(), default_rules().len());
    }
}
