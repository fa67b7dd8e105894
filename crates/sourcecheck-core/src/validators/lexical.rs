//! Lexical coverage validator.
//!
//! Measures how many of the claim's content words occur in the evidence
//! and penalises word pairs that appear out of nowhere. Low coverage is
//! treated as a sign of fabrication and reported as contradiction.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Assessment, Thresholds, Validator, ValidatorError};
use crate::config::{check_unit, ConfigError};
use crate::evidence::{joined_text, EvidenceSpan};
use crate::text::{content_set, content_tokens};
use crate::types::Claim;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LexicalCoverageParams {
    /// Adjusted coverage below this refutes
    pub min_coverage: f64,

    /// Penalty per fabricated bigram, scaled by bigram share
    pub fabrication_penalty: f64,

    /// Cap on the total penalty
    pub max_penalty: f64,

    /// Blend character n-gram coverage into word coverage
    pub use_char_ngrams: bool,

    pub char_ngram_size: usize,

    /// Share of the blend taken by character n-grams
    pub char_ngram_weight: f64,
}

impl Default for LexicalCoverageParams {
    fn default() -> Self {
        Self {
            min_coverage: 0.20,
            fabrication_penalty: 0.5,
            max_penalty: 0.5,
            use_char_ngrams: false,
            char_ngram_size: 3,
            char_ngram_weight: 0.3,
        }
    }
}

pub struct LexicalCoverageValidator {
    params: LexicalCoverageParams,
}

impl LexicalCoverageValidator {
    pub fn new(params: LexicalCoverageParams) -> Result<Self, ConfigError> {
        check_unit("lexical_coverage.min_coverage", params.min_coverage)?;
        check_unit("lexical_coverage.max_penalty", params.max_penalty)?;
        check_unit("lexical_coverage.char_ngram_weight", params.char_ngram_weight)?;
        if !(params.fabrication_penalty >= 0.0) {
            return Err(ConfigError::invalid(
                "lexical_coverage.fabrication_penalty",
                "must be non-negative",
            ));
        }
        if params.char_ngram_size == 0 {
            return Err(ConfigError::invalid("lexical_coverage.char_ngram_size", "must be positive"));
        }
        Ok(Self { params })
    }

    fn coverage(&self, claim: &str, evidence: &str) -> f64 {
        let claim_words = content_set(claim);
        if claim_words.is_empty() {
            return 1.0;
        }
        let evidence_words = content_set(evidence);
        let word = claim_words.intersection(&evidence_words).count() as f64 / claim_words.len() as f64;
        if !self.params.use_char_ngrams {
            return word;
        }
        let w = self.params.char_ngram_weight;
        (1.0 - w) * word + w * char_ngram_coverage(claim, evidence, self.params.char_ngram_size)
    }
}

/// Consecutive claim content words where neither word occurs in the evidence.
fn fabricated_bigrams(claim_tokens: &[String], evidence_words: &HashSet<String>) -> Vec<String> {
    claim_tokens
        .windows(2)
        .filter(|pair| !evidence_words.contains(&pair[0]) && !evidence_words.contains(&pair[1]))
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect()
}

fn char_ngrams(text: &str, n: usize) -> HashSet<String> {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= n)
        .flat_map(|w| {
            let chars: Vec<char> = w.chars().collect();
            chars
                .windows(n)
                .map(|g| g.iter().collect::<String>())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn char_ngram_coverage(claim: &str, evidence: &str, n: usize) -> f64 {
    let claim_grams = char_ngrams(claim, n);
    if claim_grams.is_empty() {
        return 1.0;
    }
    let evidence_grams = char_ngrams(evidence, n);
    claim_grams.intersection(&evidence_grams).count() as f64 / claim_grams.len() as f64
}

impl Validator for LexicalCoverageValidator {
    fn name(&self) -> &str {
        "lexical_coverage"
    }

    fn default_thresholds(&self) -> Thresholds {
        Thresholds {
            support: self.params.min_coverage,
            refute: 1.0 - self.params.min_coverage,
        }
    }

    fn assess(
        &self,
        claim: &Claim,
        evidence: &[EvidenceSpan],
        _source: &str,
    ) -> Result<Assessment, ValidatorError> {
        let evidence_text = joined_text(evidence);
        if evidence_text.is_empty() {
            return Ok(Assessment::neutral(0.0, "Evidence contains no text"));
        }

        let coverage = self.coverage(&claim.text, &evidence_text);
        let claim_tokens = content_tokens(&claim.text);
        let fabricated = fabricated_bigrams(&claim_tokens, &content_set(&evidence_text));

        let adjusted = if fabricated.is_empty() {
            coverage
        } else {
            let pairs = claim_tokens.len().saturating_sub(1).max(1) as f64;
            let penalty = (self.params.fabrication_penalty * fabricated.len() as f64 / pairs)
                .min(self.params.max_penalty);
            coverage * (1.0 - penalty)
        };

        let listed = if fabricated.is_empty() {
            "none".to_string()
        } else {
            fabricated.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        };

        if adjusted < self.params.min_coverage {
            Ok(Assessment::contradiction(
                1.0 - adjusted,
                format!(
                    "Low lexical coverage ({:.2}, adjusted {:.2}); fabricated phrases: {}",
                    coverage, adjusted, listed
                ),
            ))
        } else {
            Ok(Assessment::entailment(
                adjusted,
                format!("Lexical coverage {:.2}; fabricated phrases: {}", coverage, listed),
            ))
        }
    }
}
