//! Regex validator for exact facts: ages, vitals, doses.
//!
//! A pattern that matches the claim is looked up in the evidence (and,
//! failing that, the whole source). Named groups are compared: the same
//! captured values support the claim, different values contradict it.

use lazy_static::lazy_static;
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Assessment, Validator, ValidatorError};
use crate::config::ConfigError;
use crate::evidence::{joined_text, EvidenceSpan};
use crate::types::Claim;

lazy_static! {
    static ref DEFAULT_PATTERNS: Vec<Regex> = [
        r"\b(?P<age>\d{1,3})\s*-?\s*years?\s*-?\s*old\b",
        r"\b(?P<age>\d{1,3})\s*yo\b",
        r"\bbp[: ]?\s*(?P<systolic>\d{2,3})/(?P<diastolic>\d{2,3})\b",
        r"\bhr[: ]?\s*(?P<hr>\d{2,3})\b",
        r"\btemp(?:erature)?[: ]?\s*(?P<temp>\d{2,3}(?:\.\d)?)",
        r"\b(?P<dose>\d+(?:\.\d+)?)\s*(?P<unit>mg|mcg|g|ml)\b",
    ]
    .iter()
    .map(|p| RegexBuilder::new(p).case_insensitive(true).build().unwrap())
    .collect();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PatternParams {
    /// Patterns to use instead of the built-in set
    pub patterns: Vec<String>,

    /// Search the whole source when the evidence has no match
    pub search_source: bool,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            search_source: true,
        }
    }
}

pub struct PatternValidator {
    patterns: Vec<Regex>,
    search_source: bool,
}

type Values = BTreeMap<String, String>;

impl PatternValidator {
    pub fn new(params: PatternParams) -> Result<Self, ConfigError> {
        let patterns = if params.patterns.is_empty() {
            DEFAULT_PATTERNS.clone()
        } else {
            params
                .patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| ConfigError::InvalidPattern {
                            field: "pattern validator".to_string(),
                            message: e.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(Self {
            patterns,
            search_source: params.search_source,
        })
    }

    fn values(regex: &Regex, caps: &Captures<'_>) -> Values {
        regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().trim().to_lowercase()))
            })
            .collect()
    }

    fn render(values: &Values) -> String {
        values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Compare one claim match against a haystack. `None` when the
    /// pattern does not occur there at all.
    fn compare(regex: &Regex, claimed: &Values, haystack: &str) -> Option<Result<Values, Values>> {
        let mut first_mismatch = None;
        for caps in regex.captures_iter(haystack) {
            let found = Self::values(regex, &caps);
            let agrees = claimed
                .iter()
                .all(|(k, v)| found.get(k).map_or(true, |f| f == v));
            if agrees {
                return Some(Ok(found));
            }
            first_mismatch.get_or_insert(found);
        }
        first_mismatch.map(Err)
    }
}

impl Validator for PatternValidator {
    fn name(&self) -> &str {
        "pattern"
    }

    fn assess(
        &self,
        claim: &Claim,
        evidence: &[EvidenceSpan],
        source: &str,
    ) -> Result<Assessment, ValidatorError> {
        let evidence_text = joined_text(evidence);
        let mut claim_matched = false;

        for regex in &self.patterns {
            let Some(caps) = regex.captures(&claim.text) else {
                continue;
            };
            claim_matched = true;
            let claimed = Self::values(regex, &caps);

            let mut outcome = Self::compare(regex, &claimed, &evidence_text).map(|o| (o, "evidence"));
            if outcome.is_none() && self.search_source {
                outcome = Self::compare(regex, &claimed, source).map(|o| (o, "source"));
            }

            match outcome {
                Some((Ok(found), place)) => {
                    return Ok(Assessment::entailment(
                        1.0,
                        format!("Pattern matched in {} ({})", place, Self::render(&found)),
                    ));
                }
                Some((Err(found), place)) => {
                    return Ok(Assessment::contradiction(
                        1.0,
                        format!(
                            "Claim has {} but {} has {}",
                            Self::render(&claimed),
                            place,
                            Self::render(&found)
                        ),
                    ));
                }
                None => continue,
            }
        }

        let explanation = if claim_matched {
            "Claim pattern not found in evidence"
        } else {
            "No configured pattern matches the claim"
        };
        Ok(Assessment::neutral(0.0, explanation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Verdict;
    use crate::validators::{ConfiguredValidator, RawSignal};

    fn validator() -> ConfiguredValidator {
        ConfiguredValidator::new(Box::new(PatternValidator::new(PatternParams::default()).unwrap()))
    }

    fn spans(doc: &str) -> Vec<EvidenceSpan> {
        vec![EvidenceSpan::from_document(doc, 0, doc.len(), 0.5, "keyword")]
    }

    #[test]
    fn test_same_value_supports() {
        let doc = "56-year-old woman with BP 140/90.";
        let claim = Claim::new("identifiers", 0, "56 year old female");
        let result = validator().validate(&claim, &spans(doc), doc).unwrap();
        assert_eq!(result.verdict, Verdict::Supported);
        assert!(result.explanation.contains("age=56"));
    }

    #[test]
    fn test_different_value_refutes() {
        let doc = "Vitals: BP 140/90, HR 88.";
        let claim = Claim::new("vitals", 0, "BP 120/80");
        let result = validator().validate(&claim, &spans(doc), doc).unwrap();
        assert_eq!(result.verdict, Verdict::Refuted);
        assert!(result.explanation.contains("systolic=140"));
    }

    #[test]
    fn test_falls_back_to_source() {
        let doc = "Seen today. HR 72 at triage.";
        let evidence = vec![EvidenceSpan::from_document(doc, 0, 11, 0.5, "bm25")];
        let claim = Claim::new("vitals", 0, "HR 72");
        let result = validator().validate(&claim, &evidence, doc).unwrap();
        assert_eq!(result.verdict, Verdict::Supported);
        assert!(result.explanation.contains("source"));
    }

    #[test]
    fn test_unpatterned_claim_is_insufficient() {
        let doc = "Patient reports cough.";
        let claim = Claim::new("symptoms", 0, "cough");
        let result = validator().validate(&claim, &spans(doc), doc).unwrap();
        assert_eq!(result.verdict, Verdict::InsufficientEvidence);
    }

    #[test]
    fn test_custom_pattern_and_bad_regex() {
        let params = PatternParams {
            patterns: vec![r"tetanus .*?(?P<years>\d+) years? ago".to_string()],
            search_source: false,
        };
        let v = PatternValidator::new(params).unwrap();
        let doc = "Last tetanus shot 5 years ago.";
        let claim = Claim::new("history", 0, "tetanus 3 years ago");
        let a = v.assess(&claim, &spans(doc), doc).unwrap();
        assert_eq!(a.signal, RawSignal::Contradiction);

        let bad = PatternParams {
            patterns: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            PatternValidator::new(bad),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}
