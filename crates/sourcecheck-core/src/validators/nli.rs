//! Natural-language-inference validator.
//!
//! The validator asks an [`EntailmentModel`] whether each evidence span
//! entails or contradicts the claim and keeps the strongest signal. The
//! bundled [`HeuristicNli`] needs no model weights: it compares the
//! claim's content words with the span's, tracking negation scope in
//! both, so "Patient has fever" against "No fever noted." is a
//! contradiction while "No fever" against "Patient denies fever" agrees.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Assessment, Thresholds, Validator, ValidatorError};
use crate::evidence::EvidenceSpan;
use crate::text::{polarity_map, polarized_terms};
use crate::types::Claim;

/// Class probabilities for one premise / hypothesis pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NliScores {
    pub entailment: f64,
    pub contradiction: f64,
    pub neutral: f64,
}

/// Three-way entailment classifier.
pub trait EntailmentModel: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, premise: &str, hypothesis: &str) -> Result<NliScores, ValidatorError>;
}

/// Negation-aware lexical entailment.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicNli;

impl HeuristicNli {
    /// Base contradiction score for any polarity conflict.
    const CONFLICT_BASE: f64 = 0.6;
    const CONFLICT_SPAN: f64 = 0.35;
    /// Coverage at which overlap counts as entailment.
    const ENTAIL_COVERAGE: f64 = 0.5;
}

impl EntailmentModel for HeuristicNli {
    fn name(&self) -> &str {
        "heuristic-nli"
    }

    fn classify(&self, premise: &str, hypothesis: &str) -> Result<NliScores, ValidatorError> {
        // first polarity seen for each claim term
        let mut claim_terms: HashMap<String, bool> = HashMap::new();
        let mut order = Vec::new();
        for (term, negated) in polarized_terms(hypothesis) {
            if !claim_terms.contains_key(&term) {
                order.push(term.clone());
                claim_terms.insert(term, negated);
            }
        }
        if order.is_empty() {
            return Ok(NliScores {
                entailment: 0.0,
                contradiction: 0.0,
                neutral: 1.0,
            });
        }

        let premise_terms = polarity_map(premise);
        let mut matched = 0usize;
        let mut conflicts = 0usize;
        for term in &order {
            let Some(polarity) = premise_terms.get(term) else {
                continue;
            };
            matched += 1;
            let claim_negated = claim_terms[term];
            let opposed = if claim_negated {
                polarity.affirmed && !polarity.negated
            } else {
                polarity.negated && !polarity.affirmed
            };
            if opposed {
                conflicts += 1;
            }
        }

        let coverage = matched as f64 / order.len() as f64;
        let scores = if conflicts > 0 {
            let contradiction = Self::CONFLICT_BASE + Self::CONFLICT_SPAN * coverage;
            NliScores {
                entailment: 0.0,
                contradiction,
                neutral: 1.0 - contradiction,
            }
        } else {
            let entailment = if coverage >= Self::ENTAIL_COVERAGE {
                0.95 * coverage
            } else {
                0.5 * coverage
            };
            NliScores {
                entailment,
                contradiction: 0.0,
                neutral: 1.0 - entailment,
            }
        };
        Ok(scores)
    }
}

/// Validator over an entailment model.
pub struct NliValidator {
    model: Arc<dyn EntailmentModel>,
}

impl NliValidator {
    pub fn new(model: Arc<dyn EntailmentModel>) -> Self {
        Self { model }
    }
}

impl Validator for NliValidator {
    fn name(&self) -> &str {
        "nli"
    }

    fn default_thresholds(&self) -> Thresholds {
        Thresholds {
            support: 0.3,
            refute: 0.9,
        }
    }

    fn assess(
        &self,
        claim: &Claim,
        evidence: &[EvidenceSpan],
        _source: &str,
    ) -> Result<Assessment, ValidatorError> {
        let mut best_entail: Option<(f64, &EvidenceSpan)> = None;
        let mut best_contra: Option<(f64, &EvidenceSpan)> = None;

        for span in evidence {
            let scores = self.model.classify(&span.text, &claim.text)?;
            if best_entail.map_or(true, |(s, _)| scores.entailment > s) {
                best_entail = Some((scores.entailment, span));
            }
            if best_contra.map_or(true, |(s, _)| scores.contradiction > s) {
                best_contra = Some((scores.contradiction, span));
            }
        }

        let (entail, entail_span) = best_entail.map_or((0.0, None), |(s, span)| (s, Some(span)));
        let (contra, contra_span) = best_contra.map_or((0.0, None), |(s, span)| (s, Some(span)));
        let model = self.model.name();

        if contra > entail && contra >= 0.5 {
            let at = contra_span.map(EvidenceSpan::pointer).unwrap_or_default();
            return Ok(Assessment::contradiction(
                contra,
                format!("{} found contradiction ({:.2}) at {}", model, contra, at),
            ));
        }
        if entail > contra && entail > 0.0 {
            let at = entail_span.map(EvidenceSpan::pointer).unwrap_or_default();
            return Ok(Assessment::entailment(
                entail,
                format!("{} found entailment ({:.2}) at {}", model, entail, at),
            ));
        }
        Ok(Assessment::neutral(
            1.0 - entail.max(contra),
            format!("{} found no entailment or contradiction", model),
        ))
    }
}
