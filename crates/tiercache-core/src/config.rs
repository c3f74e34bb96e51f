//! Engine and tier configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::cache::Strategy;
use crate::classifier::RuleConfig;
use crate::error::CoreError;

/// Default tier for static assets
pub const STATIC_TIER: &str = "static-assets";
/// Default tier for API calls
pub const API_TIER: &str = "api";
/// Default tier for everything else
pub const DYNAMIC_TIER: &str = "dynamic-content";

/// File extensions treated as static assets by the default rules
pub const STATIC_EXTENSIONS: &[&str] = &[
    "js", "mjs", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "woff",
    "woff2", "ttf", "otf", "eot", "wasm",
];

/// A named cache partition with a fixed policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierConfig {
    pub name: String,
    pub strategy: Strategy,
    /// Maximum age in seconds before an entry is stale
    pub max_age_secs: u64,
    /// Maximum number of entries kept in the tier
    pub max_entries: usize,
}

impl TierConfig {
    pub fn new(name: &str, strategy: Strategy, max_age_secs: u64, max_entries: usize) -> Self {
        Self {
            name: name.to_string(),
            strategy,
            max_age_secs,
            max_entries,
        }
    }

    /// Maximum age as a duration, saturating at [`chrono::Duration::MAX`]
    pub fn max_age(&self) -> chrono::Duration {
        i64::try_from(self.max_age_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Configuration of a [`crate::CacheEngine`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tiers in declaration order
    pub tiers: Vec<TierConfig>,
    /// Classifier rules, first match wins
    pub rules: Vec<RuleConfig>,
    /// Tier for requests no rule matches
    pub default_tier: String,
    /// The host's own origin; requests elsewhere are cross-origin
    pub origin: Option<Url>,
    /// Global byte budget across all tiers
    pub max_size: u64,
    /// Minimum transition probability for a prediction to be prefetched
    pub prefetch_threshold: f64,
    /// Capacity of the recent-access log
    pub recent_access_capacity: usize,
    /// Longest gap between two accesses still counted as a transition
    pub transition_window_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            rules: default_rules(),
            default_tier: DYNAMIC_TIER.to_string(),
            origin: None,
            max_size: 50 * 1024 * 1024, // 50 MB
            prefetch_threshold: 0.3,
            recent_access_capacity: 100,
            transition_window_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tiers.is_empty() {
            return Err(CoreError::InvalidConfig("no tiers configured".to_string()));
        }

        let mut names = HashSet::new();
        for tier in &self.tiers {
            crate::cache::validate_tier_name(&tier.name)?;
            if !names.insert(tier.name.as_str()) {
                return Err(CoreError::InvalidConfig(format!(
                    "duplicate tier name: {}",
                    tier.name
                )));
            }
        }

        if !names.contains(self.default_tier.as_str()) {
            return Err(CoreError::InvalidConfig(format!(
                "default tier '{}' is not configured",
                self.default_tier
            )));
        }

        for rule in &self.rules {
            if !names.contains(rule.tier.as_str()) {
                return Err(CoreError::InvalidConfig(format!(
                    "rule '{}' refers to unknown tier '{}'",
                    rule.pattern, rule.tier
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.prefetch_threshold) {
            return Err(CoreError::InvalidConfig(format!(
                "prefetch_threshold {} is outside [0, 1]",
                self.prefetch_threshold
            )));
        }

        if self.recent_access_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "recent_access_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn tier(&self, name: &str) -> Option<&TierConfig> {
        self.tiers.iter().find(|t| t.name == name)
    }
}

pub fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig::new(STATIC_TIER, Strategy::CacheFirst, 30 * 24 * 3600, 100),
        TierConfig::new(API_TIER, Strategy::NetworkFirst, 5 * 60, 50),
        TierConfig::new(DYNAMIC_TIER, Strategy::StaleWhileRevalidate, 24 * 3600, 50),
    ]
}

pub fn default_rules() -> Vec<RuleConfig> {
    let mut rules: Vec<RuleConfig> = STATIC_EXTENSIONS
        .iter()
        .map(|ext| RuleConfig::glob(&format!("**/*.{}", ext), STATIC_TIER))
        .collect();

    rules.push(RuleConfig::prefix("/static/", STATIC_TIER));
    rules.push(RuleConfig::prefix("/assets/", STATIC_TIER));
    rules.push(RuleConfig::prefix("/api/", API_TIER));
    rules.push(RuleConfig::prefix("/graphql", API_TIER));
    rules.push(RuleConfig::cross_origin(API_TIER));

    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tiers.len(), 3);
        assert_eq!(config.tier(API_TIER).unwrap().strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_rejects_unknown_rule_tier() {
        let mut config = EngineConfig::default();
        config.rules.push(RuleConfig::prefix("/x/", "nowhere"));
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_duplicate_tier() {
        let mut config = EngineConfig::default();
        config
            .tiers
            .push(TierConfig::new(API_TIER, Strategy::CacheOnly, 1, 1));
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unknown_default_tier() {
        let config = EngineConfig {
            default_tier: "missing".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = EngineConfig {
            prefetch_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_reserved_tier_name() {
        let mut config = EngineConfig::default();
        config.tiers.push(TierConfig::new(
            crate::usage::PATTERN_REGION,
            Strategy::CacheFirst,
            1,
            1,
        ));
        assert!(config.validate().is_err());
    }
}
