//! Runtime configuration.
//!
//! Durations are written the human way (`"30s"`, `"2m"`, `"1h 30m"`) and
//! parsed with `humantime`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::orchestrator::RuntimeError;
use crate::resilience::{CircuitBreakerConfig, FallbackStrategy};

/// Settings for the async claim runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RuntimeConfig {
    /// Claims verified at the same time
    pub max_concurrency: usize,

    /// Per-call timeout for validator agents
    #[serde(with = "humantime_duration")]
    pub agent_timeout: Duration,

    /// Overall budget for one record; claims not started in time are abandoned
    #[serde(with = "humantime_duration::option", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Duration>,

    /// What replaces an agent vote that could not be obtained
    pub fallback: FallbackStrategy,

    /// Multiplier on the confidence of deterministic fallback results
    pub fallback_confidence_factor: f64,

    pub circuit_breaker: CircuitBreakerConfig,

    pub cache: ReportCacheConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            agent_timeout: Duration::from_secs(10),
            deadline: None,
            fallback: FallbackStrategy::default(),
            fallback_confidence_factor: 0.8,
            circuit_breaker: CircuitBreakerConfig::default(),
            cache: ReportCacheConfig::default(),
        }
    }
}

/// Report memoisation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReportCacheConfig {
    pub enabled: bool,
    pub max_entries: u64,

    #[serde(with = "humantime_duration")]
    pub ttl: Duration,
}

impl Default for ReportCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, RuntimeError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, picking the format by extension (`.json`, else YAML).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.max_concurrency == 0 {
            return Err(RuntimeError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.agent_timeout.is_zero() {
            return Err(RuntimeError::InvalidConfig(
                "agent_timeout must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fallback_confidence_factor) {
            return Err(RuntimeError::InvalidConfig(format!(
                "fallback_confidence_factor must be within [0, 1], got {}",
                self.fallback_confidence_factor
            )));
        }
        if self.circuit_breaker.failure_threshold == 0 || self.circuit_breaker.success_threshold == 0 {
            return Err(RuntimeError::InvalidConfig(
                "circuit_breaker thresholds must be at least 1".to_string(),
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

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|text| humantime::parse_duration(&text).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
