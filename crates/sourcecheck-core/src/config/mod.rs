//! Typed configuration for the verification pipeline.
//!
//! Two documents drive a run: the extraction schema (how fields become
//! claims) and the policy (retriever, validators, aggregation, quality
//! modules and scoring). Both are parsed into typed records that reject
//! unknown keys.

mod extraction;
mod policy;
mod schema;

pub use extraction::{Criticality, CriticalityWeights, ExtractionSchema, FieldSpec};
pub use policy::{
    AggregationConfig, ConflictRule, PolicyConfig, PolicySettings, QualityModuleSpec,
    RuleAction, RuleCondition, ScoringConfig, ScoringMethod, SeverityPenalties, Strategy,
    ValidatorSpec,
};
pub use schema::validate_policy_schema;

use thiserror::Error;

/// Errors raised while loading or compiling configuration.
///
/// All of these surface before any claim is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Policy failed schema validation: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown validator: {0}")]
    UnknownValidator(String),

    #[error("Unknown retriever: {0}")]
    UnknownRetriever(String),

    #[error("Unknown quality module: {0}")]
    UnknownQualityModule(String),

    #[error("Invalid parameters for {component}: {message}")]
    InvalidParams { component: String, message: String },

    #[error("Invalid pattern for {field}: {message}")]
    InvalidPattern { field: String, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Deserialize a component's free-form `params` into its typed record.
///
/// `null` means "all defaults". Unknown keys fail through the record's
/// `deny_unknown_fields`.
pub(crate) fn parse_params<T>(component: &str, params: &serde_json::Value) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).map_err(|e| ConfigError::InvalidParams {
        component: component.to_string(),
        message: e.to_string(),
    })
}

/// Check a probability-like setting lies in [0, 1].
pub(crate) fn check_unit(key: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("{} is outside [0, 1]", value)))
    }
}
