//! Retrieval-score validator.
//!
//! Trusts the retriever: enough sufficiently relevant spans means the
//! claim is grounded.

use serde::{Deserialize, Serialize};

use super::{Assessment, Thresholds, Validator, ValidatorError};
use crate::config::{check_unit, ConfigError};
use crate::evidence::EvidenceSpan;
use crate::types::Claim;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EvidenceScoreParams {
    /// Span score needed to count as strong evidence
    pub min_evidence_score: f64,

    /// Strong spans needed for support
    pub min_evidence_count: usize,
}

impl Default for EvidenceScoreParams {
    fn default() -> Self {
        Self {
            min_evidence_score: 0.3,
            min_evidence_count: 1,
        }
    }
}

pub struct EvidenceScoreValidator {
    params: EvidenceScoreParams,
}

impl EvidenceScoreValidator {
    pub fn new(params: EvidenceScoreParams) -> Result<Self, ConfigError> {
        check_unit("evidence_score.min_evidence_score", params.min_evidence_score)?;
        if params.min_evidence_count == 0 {
            return Err(ConfigError::invalid(
                "evidence_score.min_evidence_count",
                "must be at least 1",
            ));
        }
        Ok(Self { params })
    }
}

impl Validator for EvidenceScoreValidator {
    fn name(&self) -> &str {
        "evidence_score"
    }

    fn default_thresholds(&self) -> Thresholds {
        Thresholds {
            support: self.params.min_evidence_score,
            refute: 1.0,
        }
    }

    fn assess(
        &self,
        _claim: &Claim,
        evidence: &[EvidenceSpan],
        _source: &str,
    ) -> Result<Assessment, ValidatorError> {
        let strong: Vec<f64> = evidence
            .iter()
            .map(|s| s.score)
            .filter(|score| *score >= self.params.min_evidence_score)
            .collect();

        if strong.len() >= self.params.min_evidence_count {
            let mean = strong.iter().sum::<f64>() / strong.len() as f64;
            return Ok(Assessment::entailment(
                mean,
                format!(
                    "Found {} evidence span(s) with mean score {:.3}",
                    strong.len(),
                    mean
                ),
            ));
        }

        let top = evidence.iter().map(|s| s.score).fold(0.0, f64::max);
        Ok(Assessment::neutral(
            top,
            format!(
                "Found {} evidence span(s) but the best score {:.3} is below {:.3}",
                evidence.len(),
                top,
                self.params.min_evidence_score
            ),
        ))
    }
}
