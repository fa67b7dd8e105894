//! Policy parsing from YAML/JSON.
//!
//! The policy is first checked against the embedded JSON Schema so that
//! structural mistakes are reported together, then deserialized into the
//! typed records below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{check_unit, validate_policy_schema, ConfigError};
use crate::types::{ConflictHint, Verdict};

/// One validator attached to a field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ValidatorSpec {
    /// Registered validator name (e.g. "nli", "lexical_coverage")
    pub name: String,

    /// Declared weight; overrides `aggregation.default_weights`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    /// Minimum entailment confidence for `supported`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_threshold: Option<f64>,

    /// Minimum contradiction confidence for `refuted`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refute_threshold: Option<f64>,

    #[serde(default)]
    pub on_conflict: ConflictHint,

    /// Validator-specific parameters
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ValidatorSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: None,
            support_threshold: None,
            refute_threshold: None,
            on_conflict: ConflictHint::Neutral,
            params: serde_json::Value::Null,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_thresholds(mut self, support: f64, refute: f64) -> Self {
        self.support_threshold = Some(support);
        self.refute_threshold = Some(refute);
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// Aggregation strategy applied when no conflict rule resolves a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    WeightedVoting,
    Unanimous,
    Majority,
    FirstWins,
    #[default]
    #[serde(alias = "priority_based")]
    Priority,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::WeightedVoting => "weighted_voting",
            Strategy::Unanimous => "unanimous",
            Strategy::Majority => "majority",
            Strategy::FirstWins => "first_wins",
            Strategy::Priority => "priority",
        }
    }
}

/// Predicate a conflict rule checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    /// First listed validator refuted, second supported
    RefutedVsSupported,
    /// All listed validators ran and did not all agree
    Disagreement,
}

/// What a matching conflict rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Compare claim and top evidence by word-set Jaccard overlap
    CheckLexicalOverlap,
    /// Resolve to a fixed verdict
    SetVerdict,
}

/// A named condition -> action pair, evaluated in declared order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConflictRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub condition: RuleCondition,

    /// Validators the condition refers to, in order
    pub validators: Vec<String>,

    pub action: RuleAction,

    /// Overlap threshold for `check_lexical_overlap`
    #[serde(default = "default_rule_threshold")]
    pub threshold: f64,

    #[serde(default = "default_result_if_above")]
    pub result_if_above: Verdict,

    /// When unset, refuted if any listed validator refuted, else insufficient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_if_below: Option<Verdict>,

    /// Verdict for `set_verdict`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

fn default_rule_threshold() -> f64 {
    0.5
}

fn default_result_if_above() -> Verdict {
    Verdict::Supported
}

impl ConflictRule {
    /// Label used in explanations and `Disposition::resolved_by`.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            let condition = match self.condition {
                RuleCondition::RefutedVsSupported => "refuted_vs_supported",
                RuleCondition::Disagreement => "disagreement",
            };
            format!("{}({})", condition, self.validators.join(","))
        })
    }
}

/// Aggregation settings for the arbitration engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct AggregationConfig {
    pub strategy: Strategy,

    /// Per-validator weights for `weighted_voting`
    pub default_weights: BTreeMap<String, f64>,

    /// Tie-break order; missing verdicts are appended in default order
    pub verdict_priority: Vec<Verdict>,

    pub conflict_resolution: Vec<ConflictRule>,

    /// Attach every validator result to the disposition
    pub explain_conflicts: bool,

    /// Results below this confidence vote as insufficient_evidence
    pub min_confidence: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Priority,
            default_weights: BTreeMap::new(),
            verdict_priority: Verdict::DEFAULT_PRIORITY.to_vec(),
            conflict_resolution: Vec::new(),
            explain_conflicts: false,
            min_confidence: 0.0,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("aggregation.min_confidence", self.min_confidence)?;

        let mut seen = Vec::new();
        for verdict in &self.verdict_priority {
            if seen.contains(verdict) {
                return Err(ConfigError::invalid(
                    "aggregation.verdict_priority",
                    format!("{} listed twice", verdict),
                ));
            }
            seen.push(*verdict);
        }

        for (name, weight) in &self.default_weights {
            if !(*weight >= 0.0) {
                return Err(ConfigError::invalid(
                    format!("aggregation.default_weights.{}", name),
                    "weight must be non-negative",
                ));
            }
        }

        for (i, rule) in self.conflict_resolution.iter().enumerate() {
            let key = format!("aggregation.conflict_resolution[{}]", i);
            if rule.validators.len() < 2 {
                return Err(ConfigError::invalid(key, "a rule needs at least two validators"));
            }
            check_unit(&format!("{}.threshold", key), rule.threshold)?;
            if rule.action == RuleAction::SetVerdict && rule.verdict.is_none() {
                return Err(ConfigError::MissingField(format!("{}.verdict", key)));
            }
        }

        Ok(())
    }

    /// Priority list with any omitted verdicts appended, so resolution
    /// always terminates.
    pub fn full_priority(&self) -> Vec<Verdict> {
        let mut order = self.verdict_priority.clone();
        for verdict in Verdict::DEFAULT_PRIORITY {
            if !order.contains(&verdict) {
                order.push(verdict);
            }
        }
        order
    }
}

/// A quality module and its parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct QualityModuleSpec {
    pub name: String,

    #[serde(default)]
    pub params: serde_json::Value,
}

impl QualityModuleSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: serde_json::Value::Null,
        }
    }
}

/// Multiplicative penalty per issue severity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct SeverityPenalties {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityPenalties {
    fn default() -> Self {
        Self {
            high: 0.5,
            medium: 0.8,
            low: 0.9,
        }
    }
}

/// How claim verdicts roll up into `overall_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    /// Fraction of claims supported
    #[default]
    Simple,
    /// Supported claims count by their quality score
    QualityWeighted,
    /// Supported claims count by their field's criticality weight
    CriticalityWeighted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ScoringConfig {
    pub method: ScoringMethod,

    /// Share of the overall score taken from completeness
    pub completeness_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            method: ScoringMethod::Simple,
            completeness_weight: 0.0,
        }
    }
}

/// Run-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct PolicySettings {
    /// Evidence spans kept per claim (retrieval `top_k`)
    pub max_evidence_spans: usize,

    /// Pass sibling field values to context-aware retrievers
    pub include_field_context: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_evidence_spans: 5,
            include_field_context: true,
        }
    }
}

/// The verification policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Retriever kind (bm25, keyword, context_aware_bm25, semantic, hybrid)
    #[serde(default = "default_retriever")]
    pub retriever: String,

    #[serde(default)]
    pub retriever_config: serde_json::Value,

    #[serde(default)]
    pub settings: PolicySettings,

    /// Ordered validators per field
    pub validators: BTreeMap<String, Vec<ValidatorSpec>>,

    /// Validators for fields without an entry in `validators`
    #[serde(default)]
    pub default_validators: Vec<ValidatorSpec>,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub quality_modules: Vec<QualityModuleSpec>,

    #[serde(default)]
    pub quality_penalties: SeverityPenalties,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

fn default_retriever() -> String {
    "bm25".to_string()
}

impl PolicyConfig {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            name: None,
            retriever: default_retriever(),
            retriever_config: serde_json::Value::Null,
            settings: PolicySettings::default(),
            validators: BTreeMap::new(),
            default_validators: Vec::new(),
            aggregation: AggregationConfig::default(),
            quality_modules: Vec::new(),
            quality_penalties: SeverityPenalties::default(),
            scoring: ScoringConfig::default(),
        }
    }

    pub fn field_validators(mut self, field: impl Into<String>, specs: Vec<ValidatorSpec>) -> Self {
        self.validators.insert(field.into(), specs);
        self
    }

    /// Parse and validate a policy from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        validate_policy_schema(&value).map_err(ConfigError::Schema)?;
        let policy: PolicyConfig = serde_json::from_value(value)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Checks that span several sections.
    ///
    /// Component names and params are checked when the pipeline is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::MissingField("version".to_string()));
        }
        if self.settings.max_evidence_spans == 0 {
            return Err(ConfigError::invalid(
                "settings.max_evidence_spans",
                "must be at least 1",
            ));
        }

        let specs = self
            .validators
            .values()
            .flatten()
            .chain(self.default_validators.iter());
        for spec in specs {
            if let Some(weight) = spec.weight {
                if !(weight >= 0.0) {
                    return Err(ConfigError::invalid(
                        format!("validators.{}.weight", spec.name),
                        "weight must be non-negative",
                    ));
                }
            }
            for (key, value) in [
                ("support_threshold", spec.support_threshold),
                ("refute_threshold", spec.refute_threshold),
            ] {
                if let Some(v) = value {
                    check_unit(&format!("validators.{}.{}", spec.name, key), v)?;
                }
            }
        }

        self.aggregation.validate()?;

        let p = &self.quality_penalties;
        for (key, value) in [("high", p.high), ("medium", p.medium), ("low", p.low)] {
            check_unit(&format!("quality_penalties.{}", key), value)?;
        }
        check_unit("scoring.completeness_weight", self.scoring.completeness_weight)?;

        Ok(())
    }

    /// Validator specs that apply to `field`.
    pub fn validators_for(&self, field: &str) -> &[ValidatorSpec] {
        self.validators
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_validators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"
version: "1.0"
retriever: bm25
retriever_config:
  chunk_size: 200
  overlap: 50
settings:
  max_evidence_spans: 3
validators:
  symptoms:
    - name: nli
      refute_threshold: 0.9
      support_threshold: 0.3
    - name: hybrid
      weight: 0.6
default_validators:
  - name: lexical_coverage
aggregation:
  strategy: weighted_voting
  explain_conflicts: true
  conflict_resolution:
    - name: overlap_override
      condition: refuted_vs_supported
      validators: [nli, hybrid]
      action: check_lexical_overlap
      threshold: 0.6
quality_modules:
  - name: temporal_numeric_drift
    params:
      tolerance_percent: 10
scoring:
  method: quality_weighted
"#;

    #[test]
    fn test_parse_policy() {
        let policy = PolicyConfig::from_yaml(POLICY).unwrap();
        assert_eq!(policy.retriever, "bm25");
        assert_eq!(policy.settings.max_evidence_spans, 3);
        assert_eq!(policy.validators["symptoms"].len(), 2);
        assert_eq!(policy.validators["symptoms"][1].weight, Some(0.6));
        assert_eq!(policy.aggregation.strategy, Strategy::WeightedVoting);
        let rule = &policy.aggregation.conflict_resolution[0];
        assert_eq!(rule.result_if_above, Verdict::Supported);
        assert_eq!(rule.label(), "overlap_override");
        assert_eq!(policy.scoring.method, ScoringMethod::QualityWeighted);
        assert_eq!(policy.quality_penalties.high, 0.5);
    }

    #[test]
    fn test_validators_for_falls_back_to_defaults() {
        let policy = PolicyConfig::from_yaml(POLICY).unwrap();
        assert_eq!(policy.validators_for("symptoms")[0].name, "nli");
        assert_eq!(policy.validators_for("plan")[0].name, "lexical_coverage");
    }

    #[test]
    fn test_missing_validators_fails_schema() {
        let yaml = r#"
version: "1.0"
retriever: bm25
"#;
        assert!(matches!(PolicyConfig::from_yaml(yaml), Err(ConfigError::Schema(_))));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let yaml = r#"
version: "1.0"
validators: {}
retreiver: bm25
"#;
        assert!(PolicyConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let yaml = r#"
version: "1.0"
validators: {}
aggregation:
  strategy: coin_flip
"#;
        assert!(PolicyConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let yaml = r#"
version: "1.0"
validators:
  summary:
    - name: nli
      refute_threshold: 1.5
"#;
        assert!(PolicyConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rule_needs_two_validators() {
        let yaml = r#"
version: "1.0"
validators: {}
aggregation:
  conflict_resolution:
    - condition: disagreement
      validators: [nli]
      action: set_verdict
      verdict: refuted
"#;
        assert!(matches!(
            PolicyConfig::from_yaml(yaml),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_full_priority_appends_missing() {
        let config = AggregationConfig {
            verdict_priority: vec![Verdict::Supported],
            ..Default::default()
        };
        assert_eq!(
            config.full_priority(),
            vec![Verdict::Supported, Verdict::Refuted, Verdict::InsufficientEvidence]
        );
    }
}
