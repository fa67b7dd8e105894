//! Retrieval score blended with embedding similarity.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{Assessment, Thresholds, Validator, ValidatorError};
use crate::config::{check_unit, ConfigError};
use crate::evidence::EvidenceSpan;
use crate::retrieval::{cosine_similarity, Embedder};
use crate::types::Claim;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HybridParams {
    /// Weight of the retrieval score; similarity gets the rest
    pub bm25_weight: f64,

    /// Added when the claim appears verbatim in a span, or a boost term does
    pub literal_boost: f64,

    /// Extra terms whose presence in a span earns the boost
    pub boost_terms: Vec<String>,

    pub min_evidence_score: f64,
}

impl Default for HybridParams {
    fn default() -> Self {
        Self {
            bm25_weight: 0.5,
            literal_boost: 0.2,
            boost_terms: Vec::new(),
            min_evidence_score: 0.3,
        }
    }
}

pub struct HybridValidator {
    params: HybridParams,
    embedder: Arc<dyn Embedder>,
}

impl HybridValidator {
    pub fn new(mut params: HybridParams, embedder: Arc<dyn Embedder>) -> Result<Self, ConfigError> {
        check_unit("hybrid.bm25_weight", params.bm25_weight)?;
        check_unit("hybrid.literal_boost", params.literal_boost)?;
        check_unit("hybrid.min_evidence_score", params.min_evidence_score)?;
        params.boost_terms = params.boost_terms.iter().map(|t| t.to_lowercase()).collect();
        Ok(Self { params, embedder })
    }

    fn score(&self, claim_lower: &str, claim_vector: &[f32], span: &EvidenceSpan) -> (f64, bool) {
        let w = self.params.bm25_weight;
        let similarity = cosine_similarity(claim_vector, &self.embedder.embed(&span.text)).max(0.0);
        let mut score = w * span.score.clamp(0.0, 1.0) + (1.0 - w) * similarity;

        let span_lower = span.text.to_lowercase();
        let boosted = (!claim_lower.is_empty() && span_lower.contains(claim_lower))
            || self.params.boost_terms.iter().any(|t| span_lower.contains(t.as_str()));
        if boosted {
            score += self.params.literal_boost;
        }
        (score.min(1.0), boosted)
    }
}

impl Validator for HybridValidator {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn default_thresholds(&self) -> Thresholds {
        Thresholds {
            support: self.params.min_evidence_score,
            refute: 1.0,
        }
    }

    fn assess(
        &self,
        claim: &Claim,
        evidence: &[EvidenceSpan],
        _source: &str,
    ) -> Result<Assessment, ValidatorError> {
        let claim_lower = claim.text.trim().to_lowercase();
        let claim_vector = self.embedder.embed(&claim.text);

        let (best, boosted) = evidence
            .iter()
            .map(|span| self.score(&claim_lower, &claim_vector, span))
            .fold((0.0, false), |acc, s| if s.0 > acc.0 { s } else { acc });

        Ok(Assessment::entailment(
            best,
            format!(
                "Hybrid score {:.3} (retrieval weight {:.1}, similarity weight {:.1}){}",
                best,
                self.params.bm25_weight,
                1.0 - self.params.bm25_weight,
                if boosted { ", literal match boosted" } else { "" }
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::HashEmbedder;
    use crate::types::Verdict;
    use crate::validators::ConfiguredValidator;

    fn validator(params: HybridParams) -> ConfiguredValidator {
        ConfiguredValidator::new(Box::new(
            HybridValidator::new(params, Arc::new(HashEmbedder::default())).unwrap(),
        ))
    }

    #[test]
    fn test_literal_match_is_boosted_and_supported() {
        let doc = "Persistent dry cough for two weeks.";
        let span = EvidenceSpan::from_document(doc, 0, doc.len(), 0.1, "bm25");
        let claim = Claim::new("symptoms", 0, "dry cough");
        let result = validator(HybridParams::default()).validate(&claim, &[span], doc).unwrap();
        assert_eq!(result.verdict, Verdict::Supported);
        assert!(result.explanation.contains("boosted"));
    }

    #[test]
    fn test_unrelated_span_is_insufficient() {
        let doc = "Blood pressure stable.";
        let span = EvidenceSpan::from_document(doc, 0, doc.len(), 0.05, "bm25");
        let claim = Claim::new("symptoms", 0, "quarterly revenue grew");
        let result = validator(HybridParams::default()).validate(&claim, &[span], doc).unwrap();
        assert_eq!(result.verdict, Verdict::InsufficientEvidence);
    }

    #[test]
    fn test_boost_terms() {
        let doc = "Started amoxicillin.";
        let span = EvidenceSpan::from_document(doc, 0, doc.len(), 0.0, "bm25");
        let params = HybridParams {
            bm25_weight: 1.0,
            boost_terms: vec!["Amoxicillin".to_string()],
            ..Default::default()
        };
        let v = HybridValidator::new(params, Arc::new(HashEmbedder::default())).unwrap();
        let claim = Claim::new("plan", 0, "antibiotics");
        let a = v.assess(&claim, &[span], doc).unwrap();
        assert!((a.confidence - 0.2).abs() < 1e-9);
    }
}
