//! Omission and fabrication heuristics.
//!
//! Omission: details in the top evidence (proper nouns, measurements,
//! quoted phrases, "for her husband"-style context) that the claim leaves
//! out. Fabrication: details in the claim the evidence never mentions, or
//! a claim that barely shares vocabulary with its evidence.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{context_snippet, dedup_ci, QualityModule};
use crate::config::{check_unit, ConfigError};
use crate::text::{content_set, is_stopword, snippet, MEASUREMENT_PATTERN, PROPER_NOUN_PATTERN, QUOTED_PATTERN};
use crate::types::{Disposition, IssueKind, QualityIssue, Severity, Verdict};

lazy_static! {
    static ref CONTEXT_PHRASES: Vec<Regex> = [
        r"(?i)\bfor (?:my|his|her|their|the) \w+(?:\s+\w+)?",
        r"(?i)\bwith (?:my|his|her|their|the) \w+(?:\s+\w+)?",
        r"(?i)\babout (?:my|his|her|their|the) \w+(?:\s+\w+)?",
        r"(?i)\baccording to (?:the )?\w+",
        r"(?i)\bper (?:the )?\w+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    /// Qualifiers and findings a summary tends to invent
    static ref DETAIL_PHRASES: Vec<Regex> = [
        r"(?i)\b(?:wet|dry|deep|shallow|severe|mild|moderate|acute|chronic|large|small)\s+\w+",
        r"(?i)\b(?:hospital|clinic|emergency|urgent)\s+\w+",
        r"(?i)\b(?:dizziness|nausea|vomiting|headache|fever|chills|weakness|fatigue)\b",
        r"(?i)\b(?:pain|ache|discomfort|soreness)\s+(?:in|at|around)\s+\w+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

/// Capitalised words that are never names.
const NOT_PROPER: &[&str] = &["The", "A", "An", "This", "That", "These", "Those", "I", "He", "She"];

/// Subject words a summary may add without inventing anything.
const GENERIC_SUBJECTS: &[&str] = &["patient", "subject", "client", "caller"];

/// Claims with fewer content words are too short to judge vocabulary.
const MIN_WORDS_FOR_SHARING: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SemanticQualityParams {
    /// Cap on issues per claim
    pub max_issues: usize,

    /// Minimum words in a quoted or contextual phrase
    pub min_phrase_length: usize,

    /// Share of claim content words that must appear in the evidence
    pub min_shared_vocabulary: f64,

    /// Gate: inspect when validator agreement is below this
    pub min_agreement: Option<f64>,

    /// Gate: inspect when confidence is below this
    pub min_confidence: Option<f64>,

    /// Gate: inspect insufficient-evidence verdicts
    pub analyze_insufficient: bool,
}

impl Default for SemanticQualityParams {
    fn default() -> Self {
        Self {
            max_issues: 3,
            min_phrase_length: 2,
            min_shared_vocabulary: 0.2,
            min_agreement: None,
            min_confidence: None,
            analyze_insufficient: true,
        }
    }
}

pub struct SemanticQualityModule {
    params: SemanticQualityParams,
}

fn proper_nouns(text: &str) -> Vec<String> {
    PROPER_NOUN_PATTERN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|m| m.len() > 2 && !NOT_PROPER.contains(m))
        .map(str::to_string)
        .collect()
}

/// At least one word that is not a stopword.
fn is_meaningful(phrase: &str) -> bool {
    phrase
        .trim_matches('"')
        .split_whitespace()
        .any(|w| !is_stopword(&w.to_lowercase()))
}

impl SemanticQualityModule {
    pub fn new(params: SemanticQualityParams) -> Result<Self, ConfigError> {
        check_unit("semantic_quality.min_shared_vocabulary", params.min_shared_vocabulary)?;
        for (key, gate) in [
            ("semantic_quality.min_agreement", params.min_agreement),
            ("semantic_quality.min_confidence", params.min_confidence),
        ] {
            if let Some(value) = gate {
                check_unit(key, value)?;
            }
        }
        Ok(Self { params })
    }

    fn omitted_details(&self, claim: &str, evidence: &str) -> Vec<String> {
        let claim_lower = claim.to_lowercase();
        let absent = |s: &str| !claim_lower.contains(&s.to_lowercase());
        let mut details = Vec::new();

        details.extend(
            proper_nouns(evidence)
                .into_iter()
                .filter(|n| absent(n) && is_meaningful(n)),
        );

        for caps in MEASUREMENT_PATTERN.captures_iter(evidence) {
            let measure = format!("{} {}", &caps[1], &caps[2]);
            if absent(&measure) && absent(&caps[0]) {
                details.push(measure);
            }
        }

        for caps in QUOTED_PATTERN.captures_iter(evidence) {
            let quote = &caps[1];
            if absent(quote)
                && quote.split_whitespace().count() >= self.params.min_phrase_length
                && is_meaningful(quote)
            {
                details.push(format!("\"{}\"", quote));
            }
        }

        for regex in CONTEXT_PHRASES.iter() {
            for m in regex.find_iter(evidence) {
                let phrase = m.as_str();
                if phrase.split_whitespace().count() >= self.params.min_phrase_length
                    && absent(phrase)
                    && is_meaningful(phrase)
                {
                    details.push(phrase.to_string());
                }
            }
        }

        dedup_ci(details)
    }

    fn fabricated_details(&self, claim: &str, evidence: &str) -> Vec<String> {
        let evidence_lower = evidence.to_lowercase();
        let absent = |s: &str| !evidence_lower.contains(&s.to_lowercase());
        let mut details = Vec::new();

        for noun in proper_nouns(claim) {
            let lower = noun.to_lowercase();
            if is_stopword(&lower) || GENERIC_SUBJECTS.contains(&lower.as_str()) {
                continue;
            }
            if absent(&noun) && is_meaningful(&noun) {
                details.push(noun);
            }
        }

        for regex in DETAIL_PHRASES.iter() {
            for m in regex.find_iter(claim) {
                if absent(m.as_str()) {
                    details.push(m.as_str().to_string());
                }
            }
        }

        dedup_ci(details)
    }

    /// Share of claim content words present in the evidence, `None` for
    /// claims too short to judge.
    fn shared_vocabulary(claim: &str, evidence: &str) -> Option<f64> {
        let claim_words = content_set(claim);
        if claim_words.len() < MIN_WORDS_FOR_SHARING {
            return None;
        }
        let evidence_words = content_set(evidence);
        let shared = claim_words.intersection(&evidence_words).count();
        Some(shared as f64 / claim_words.len() as f64)
    }
}

impl QualityModule for SemanticQualityModule {
    fn name(&self) -> &str {
        "semantic_quality"
    }

    fn should_analyze(&self, disposition: &Disposition) -> bool {
        let p = &self.params;
        if p.min_agreement.is_none() && p.min_confidence.is_none() {
            return true;
        }
        p.min_agreement.is_some_and(|min| disposition.agreement < min)
            || p.min_confidence.is_some_and(|min| disposition.confidence < min)
            || (p.analyze_insufficient && disposition.verdict == Verdict::InsufficientEvidence)
    }

    fn analyze(&self, disposition: &Disposition, _source: &str) -> Vec<QualityIssue> {
        let Some(top) = disposition.top_evidence() else {
            return Vec::new();
        };
        let claim = disposition.claim.text.as_str();
        let evidence = top.text.as_str();
        let mut issues = Vec::new();

        for detail in self.fabricated_details(claim, evidence) {
            issues.push(
                QualityIssue::new(
                    self.name(),
                    IssueKind::Fabrication,
                    Severity::High,
                    format!("Claim includes detail not found in evidence: '{}'", detail),
                )
                .with_evidence(snippet(evidence, 100))
                .with_claim(context_snippet(claim, &detail))
                .with_suggestion(format!("Verify or remove unsupported detail: '{}'", detail)),
            );
        }

        if let Some(shared) = Self::shared_vocabulary(claim, evidence) {
            if shared < self.params.min_shared_vocabulary {
                issues.push(
                    QualityIssue::new(
                        self.name(),
                        IssueKind::Fabrication,
                        Severity::Medium,
                        format!(
                            "Claim shares only {:.0}% of its vocabulary with the evidence",
                            shared * 100.0
                        ),
                    )
                    .with_evidence(snippet(evidence, 100))
                    .with_claim(snippet(claim, 100))
                    .with_suggestion("Check the claim is grounded in this part of the source"),
                );
            }
        }

        for detail in self.omitted_details(claim, evidence) {
            issues.push(
                QualityIssue::new(
                    self.name(),
                    IssueKind::Omission,
                    Severity::Low,
                    format!("Claim omits important detail: '{}'", detail),
                )
                .with_evidence(context_snippet(evidence, &detail))
                .with_claim(snippet(claim, 100))
                .with_suggestion(format!("Consider including: '{}'", detail)),
            );
        }

        issues.truncate(self.params.max_issues);
        issues
    }
}
