//! Claim validators.
//!
//! A validator inspects one claim against its evidence and reports a raw
//! signal: entailment, contradiction or neither, with a confidence. The
//! per-spec thresholds in [`ConfiguredValidator`] turn that signal into a
//! [`Verdict`]. Validators never see each other; combining them is the
//! arbitration engine's job.

mod always;
mod evidence_score;
mod hybrid;
mod lexical;
mod nli;
mod pattern;
mod temporal;

pub use always::AlwaysSupported;
pub use evidence_score::{EvidenceScoreParams, EvidenceScoreValidator};
pub use hybrid::{HybridParams, HybridValidator};
pub use lexical::{LexicalCoverageParams, LexicalCoverageValidator};
pub use nli::{EntailmentModel, HeuristicNli, NliScores, NliValidator};
pub use pattern::{PatternParams, PatternValidator};
pub use temporal::{TemporalDriftParams, TemporalDriftValidator};

use std::sync::Arc;
use thiserror::Error;

use crate::config::{parse_params, ConfigError, ValidatorSpec};
use crate::evidence::EvidenceSpan;
use crate::retrieval::{Embedder, HashEmbedder};
use crate::types::{Claim, ConflictHint, ValidatorResult, Verdict};

/// Errors a validator may raise while assessing a claim.
///
/// These never abort a run; the checker records them as failed results.
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Raw signal before thresholds are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSignal {
    Entailment,
    Contradiction,
    Neutral,
}

/// What a validator concluded, before thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub signal: RawSignal,
    pub confidence: f64,
    pub explanation: String,
}

impl Assessment {
    pub fn entailment(confidence: f64, explanation: impl Into<String>) -> Self {
        Self::new(RawSignal::Entailment, confidence, explanation)
    }

    pub fn contradiction(confidence: f64, explanation: impl Into<String>) -> Self {
        Self::new(RawSignal::Contradiction, confidence, explanation)
    }

    pub fn neutral(confidence: f64, explanation: impl Into<String>) -> Self {
        Self::new(RawSignal::Neutral, confidence, explanation)
    }

    fn new(signal: RawSignal, confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            signal,
            confidence: confidence.clamp(0.0, 1.0),
            explanation: explanation.into(),
        }
    }
}

/// Support / refute thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub support: f64,
    pub refute: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            support: 0.5,
            refute: 0.5,
        }
    }
}

/// Validator-specific logic.
///
/// Implementations only see claims that have at least one evidence span.
pub trait Validator: Send + Sync {
    /// Registered name, recorded on every result.
    fn name(&self) -> &str;

    /// Thresholds used when the `ValidatorSpec` does not set them.
    fn default_thresholds(&self) -> Thresholds {
        Thresholds::default()
    }

    fn assess(
        &self,
        claim: &Claim,
        evidence: &[EvidenceSpan],
        source: &str,
    ) -> Result<Assessment, ValidatorError>;
}

/// Models shared by the validators that need them.
#[derive(Clone)]
pub struct ModelSet {
    pub entailment: Arc<dyn EntailmentModel>,
    pub embedder: Arc<dyn Embedder>,
}

impl Default for ModelSet {
    fn default() -> Self {
        Self {
            entailment: Arc::new(HeuristicNli),
            embedder: Arc::new(HashEmbedder::default()),
        }
    }
}

/// A validator plus the `ValidatorSpec` settings that wrap it.
pub struct ConfiguredValidator {
    inner: Box<dyn Validator>,
    support_threshold: f64,
    refute_threshold: f64,
    weight: Option<f64>,
    on_conflict: ConflictHint,
}

impl ConfiguredValidator {
    pub fn new(inner: Box<dyn Validator>) -> Self {
        let thresholds = inner.default_thresholds();
        Self {
            inner,
            support_threshold: thresholds.support,
            refute_threshold: thresholds.refute,
            weight: None,
            on_conflict: ConflictHint::Neutral,
        }
    }

    fn with_spec(mut self, spec: &ValidatorSpec) -> Self {
        if let Some(support) = spec.support_threshold {
            self.support_threshold = support;
        }
        if let Some(refute) = spec.refute_threshold {
            self.refute_threshold = refute;
        }
        self.weight = spec.weight;
        self.on_conflict = spec.on_conflict;
        self
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            support: self.support_threshold,
            refute: self.refute_threshold,
        }
    }

    /// Validate one claim.
    ///
    /// Empty evidence short-circuits to insufficient_evidence with zero
    /// confidence; the validator's own logic is not run.
    pub fn validate(
        &self,
        claim: &Claim,
        evidence: &[EvidenceSpan],
        source: &str,
    ) -> Result<ValidatorResult, ValidatorError> {
        let result = if evidence.is_empty() {
            ValidatorResult::new(
                self.name(),
                Verdict::InsufficientEvidence,
                0.0,
                "No evidence retrieved for claim",
            )
        } else {
            let assessment = self.inner.assess(claim, evidence, source)?;
            let verdict = self.verdict_for(&assessment);
            ValidatorResult::new(self.name(), verdict, assessment.confidence, assessment.explanation)
        };

        let result = result.with_hint(self.on_conflict);
        Ok(match self.weight {
            Some(weight) => result.with_weight(weight),
            None => result,
        })
    }

    fn verdict_for(&self, assessment: &Assessment) -> Verdict {
        match assessment.signal {
            RawSignal::Contradiction if assessment.confidence >= self.refute_threshold => Verdict::Refuted,
            RawSignal::Entailment if assessment.confidence >= self.support_threshold => Verdict::Supported,
            _ => Verdict::InsufficientEvidence,
        }
    }
}

impl std::fmt::Debug for ConfiguredValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredValidator")
            .field("name", &self.name())
            .field("support_threshold", &self.support_threshold)
            .field("refute_threshold", &self.refute_threshold)
            .field("weight", &self.weight)
            .finish()
    }
}

/// Registered name for a validator name or alias.
///
/// Results always carry the registered name, so anything that refers to
/// validators by name (weights, conflict rules) should go through this.
pub fn canonical_name(name: &str) -> Option<&'static str> {
    let canonical = match name {
        "nli" | "nli_validator" => "nli",
        "evidence_score" | "bm25_validator" => "evidence_score",
        "lexical_coverage" | "lexical_coverage_validator" => "lexical_coverage",
        "hybrid" => "hybrid",
        "pattern" | "regex" => "pattern",
        "temporal_drift" | "temporal_drift_validator" => "temporal_drift",
        "always_supported" | "always_true" => "always_supported",
        _ => return None,
    };
    Some(canonical)
}

/// Build a validator from its spec.
///
/// Names are resolved against a fixed table; a few historical names are
/// accepted as aliases.
pub fn build_validator(spec: &ValidatorSpec, models: &ModelSet) -> Result<ConfiguredValidator, ConfigError> {
    let component = format!("validator {}", spec.name);
    let name = canonical_name(&spec.name).ok_or_else(|| ConfigError::UnknownValidator(spec.name.clone()))?;
    let inner: Box<dyn Validator> = match name {
        "nli" => {
            require_no_params(&component, &spec.params)?;
            Box::new(NliValidator::new(models.entailment.clone()))
        }
        "evidence_score" => {
            Box::new(EvidenceScoreValidator::new(parse_params(&component, &spec.params)?)?)
        }
        "lexical_coverage" => {
            Box::new(LexicalCoverageValidator::new(parse_params(&component, &spec.params)?)?)
        }
        "hybrid" => Box::new(HybridValidator::new(
            parse_params(&component, &spec.params)?,
            models.embedder.clone(),
        )?),
        "pattern" => Box::new(PatternValidator::new(parse_params(&component, &spec.params)?)?),
        "temporal_drift" => {
            Box::new(TemporalDriftValidator::new(parse_params(&component, &spec.params)?))
        }
        "always_supported" => {
            require_no_params(&component, &spec.params)?;
            Box::new(AlwaysSupported)
        }
        other => return Err(ConfigError::UnknownValidator(other.to_string())),
    };
    Ok(ConfiguredValidator::new(inner).with_spec(spec))
}

fn require_no_params(component: &str, params: &serde_json::Value) -> Result<(), ConfigError> {
    match params {
        serde_json::Value::Null => Ok(()),
        serde_json::Value::Object(map) if map.is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidParams {
            component: component.to_string(),
            message: "takes no parameters".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Assessment);

    impl Validator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn assess(&self, _: &Claim, _: &[EvidenceSpan], _: &str) -> Result<Assessment, ValidatorError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl Validator for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn assess(&self, _: &Claim, _: &[EvidenceSpan], _: &str) -> Result<Assessment, ValidatorError> {
            Err(ValidatorError::Model("offline".to_string()))
        }
    }

    fn span() -> Vec<EvidenceSpan> {
        vec![EvidenceSpan::from_document("No fever noted.", 0, 15, 0.5, "bm25")]
    }

    #[test]
    fn test_thresholds_map_signal() {
        let claim = Claim::new("symptoms", 0, "fever");
        let validator = ConfiguredValidator::new(Box::new(Fixed(Assessment::contradiction(0.7, "x"))));
        assert_eq!(validator.validate(&claim, &span(), "").unwrap().verdict, Verdict::Refuted);

        let strict = ConfiguredValidator::new(Box::new(Fixed(Assessment::contradiction(0.7, "x"))))
            .with_spec(&ValidatorSpec::named("fixed").with_thresholds(0.5, 0.9));
        assert_eq!(
            strict.validate(&claim, &span(), "").unwrap().verdict,
            Verdict::InsufficientEvidence
        );

        let neutral = ConfiguredValidator::new(Box::new(Fixed(Assessment::neutral(1.0, "x"))));
        assert_eq!(
            neutral.validate(&claim, &span(), "").unwrap().verdict,
            Verdict::InsufficientEvidence
        );
    }

    #[test]
    fn test_empty_evidence_skips_logic() {
        let claim = Claim::new("symptoms", 0, "fever");
        let validator = ConfiguredValidator::new(Box::new(Broken));
        let result = validator.validate(&claim, &[], "").unwrap();
        assert_eq!(result.verdict, Verdict::InsufficientEvidence);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_failure_propagates() {
        let claim = Claim::new("symptoms", 0, "fever");
        let validator = ConfiguredValidator::new(Box::new(Broken));
        assert!(matches!(
            validator.validate(&claim, &span(), ""),
            Err(ValidatorError::Model(_))
        ));
    }

    #[test]
    fn test_spec_weight_and_hint_travel_with_result() {
        let spec = ValidatorSpec {
            on_conflict: ConflictHint::PreferRefute,
            ..ValidatorSpec::named("always_supported").with_weight(0.6)
        };
        let validator = build_validator(&spec, &ModelSet::default()).unwrap();
        let result = validator
            .validate(&Claim::new("f", 0, "x"), &span(), "")
            .unwrap();
        assert_eq!(result.weight, Some(0.6));
        assert_eq!(result.on_conflict, ConflictHint::PreferRefute);
        assert_eq!(result.verdict, Verdict::Supported);
    }

    #[test]
    fn test_registry_names_and_aliases() {
        let models = ModelSet::default();
        for name in [
            "nli",
            "nli_validator",
            "evidence_score",
            "bm25_validator",
            "lexical_coverage",
            "hybrid",
            "pattern",
            "temporal_drift",
            "always_true",
        ] {
            assert!(build_validator(&ValidatorSpec::named(name), &models).is_ok(), "{}", name);
        }
        assert!(matches!(
            build_validator(&ValidatorSpec::named("oracle"), &models),
            Err(ConfigError::UnknownValidator(_))
        ));
    }

    #[test]
    fn test_unknown_params_rejected() {
        let spec = ValidatorSpec::named("lexical_coverage")
            .with_params(serde_json::json!({ "min_coverag": 0.3 }));
        assert!(matches!(
            build_validator(&spec, &ModelSet::default()),
            Err(ConfigError::InvalidParams { .. })
        ));
        let spec = ValidatorSpec::named("nli").with_params(serde_json::json!({ "model": "x" }));
        assert!(build_validator(&spec, &ModelSet::default()).is_err());
    }
}
