//! Configuration for the recovery toolkit.
//!
//! All values are static for the lifetime of a toolkit. Durations are
//! written in human-readable form (`"500ms"`, `"1m 30s"`).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::resilience::{BudgetConfig, CircuitBreakerConfig};

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Negative cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NegativeCacheConfig {
    /// TTL applied when `set` is called without one
    #[serde(with = "humantime_duration")]
    pub default_ttl: Duration,

    /// Upper bound on remembered failures
    pub max_entries: u64,
}

impl Default for NegativeCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(5 * 60),
            max_entries: 10_000,
        }
    }
}

/// Checkpoint manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Work items kept before the stalest one is evicted
    pub max_issues: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self { max_issues: 256 }
    }
}

/// Top-level toolkit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub circuit_breaker: CircuitBreakerConfig,

    pub negative_cache: NegativeCacheConfig,

    pub budget: BudgetConfig,

    pub checkpoints: CheckpointConfig,

    /// Primary-operation timeout used by `with_fallback`
    #[serde(with = "humantime_duration")]
    pub fallback_timeout: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            negative_cache: NegativeCacheConfig::default(),
            budget: BudgetConfig::default(),
            checkpoints: CheckpointConfig::default(),
            fallback_timeout: crate::resilience::DEFAULT_FALLBACK_TIMEOUT,
        }
    }
}

impl RecoveryConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, service) in &self.circuit_breaker.services {
            if service.max_retries == 0 {
                return Err(ConfigError::Invalid(format!(
                    "service '{}' must allow at least one attempt",
                    name
                )));
            }
        }

        let budget = &self.budget;
        for (label, ratio) in [
            ("checkpoint_ratio", budget.checkpoint_ratio),
            ("compress_ratio", budget.compress_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in (0, 1], got {}",
                    label, ratio
                )));
            }
        }
        if budget.compress_ratio > budget.checkpoint_ratio {
            return Err(ConfigError::Invalid(
                "compress_ratio must not exceed checkpoint_ratio".to_string(),
            ));
        }

        if self.negative_cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "negative_cache.max_entries must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

pub(crate) mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod humantime_durations {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(
            durations
                .iter()
                .map(|d| humantime::format_duration(*d).to_string()),
        )
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|text| humantime::parse_duration(text).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backstop_core::Phase;

    #[test]
    fn test_defaults_are_valid() {
        let config = RecoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.circuit_breaker.cooldown, Duration::from_secs(60));
        assert_eq!(config.negative_cache.default_ttl, Duration::from_secs(300));
        assert_eq!(config.budget.total_budget, 100_000);
        assert_eq!(config.fallback_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_yaml_with_human_durations() {
        let yaml = r#"
circuit_breaker:
  cooldown: 2m
  services:
    search:
      max_retries: 2
      backoff: ["250ms", "1s"]
negative_cache:
  default_ttl: 30s
budget:
  total_budget: 5000
  phase_budgets:
    CODE: 2500
fallback_timeout: 10s
"#;
        let config = RecoveryConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.circuit_breaker.cooldown, Duration::from_secs(120));
        let search = &config.circuit_breaker.services["search"];
        assert_eq!(search.max_retries, 2);
        assert_eq!(
            search.backoff,
            vec![Duration::from_millis(250), Duration::from_secs(1)]
        );
        assert_eq!(config.negative_cache.default_ttl, Duration::from_secs(30));
        assert_eq!(config.negative_cache.max_entries, 10_000);
        assert_eq!(config.budget.phase_budgets.get(&Phase::Code), Some(&2500));
        assert_eq!(config.budget.phase_budgets.get(&Phase::Plan), None);
        assert_eq!(config.fallback_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_json_rejects_zero_retries() {
        let json = r#"{
            "circuit_breaker": {
                "cooldown": "60s",
                "services": { "flaky": { "max_retries": 0, "backoff": [] } }
            }
        }"#;
        let err = RecoveryConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_inverted_ratios() {
        let mut config = RecoveryConfig::default();
        config.budget.compress_ratio = 0.5;
        config.budget.checkpoint_ratio = 0.25;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_duration_is_parse_error() {
        let json = r#"{ "fallback_timeout": "soon" }"#;
        let err = RecoveryConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
