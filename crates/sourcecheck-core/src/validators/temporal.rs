//! Temporal drift validator.
//!
//! Relative time references ("yesterday", "3 days ago", "in 2 weeks") are
//! mapped to day offsets and compared between claim and evidence. A claim
//! that moves an event by more than `drift_threshold_days` contradicts the
//! source even if every other word matches.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Assessment, Thresholds, Validator, ValidatorError};
use crate::evidence::{joined_text, EvidenceSpan};
use crate::text::content_set;
use crate::types::Claim;

lazy_static! {
    static ref RELATIVE_ANCHORS: Vec<(&'static str, Regex, i64)> = [
        ("today", 0),
        ("this morning", 0),
        ("this afternoon", 0),
        ("tonight", 0),
        ("yesterday", -1),
        ("last night", -1),
        ("last week", -7),
        ("last month", -30),
        ("tomorrow", 1),
        ("next week", 7),
        ("next month", 30),
    ]
    .into_iter()
    .map(|(phrase, days)| {
        let regex = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase))).unwrap();
        (phrase, regex, days)
    })
    .collect();

    /// "3 days ago", "in 2 weeks", "next 5 days"
    static ref NUMERIC_ANCHOR: Regex = Regex::new(
        r"(?i)\b(?:(in|next)\s+)?(\d+)\s*(day|week|month|year)s?\b"
    ).unwrap();
}

/// Claim-to-evidence word overlap that counts an undated claim as the
/// same event.
const SAME_EVENT_OVERLAP: f64 = 0.4;

#[derive(Debug, Clone, PartialEq)]
struct Anchor {
    days: i64,
    numeric: bool,
    phrase: String,
}

fn anchors(text: &str) -> Vec<Anchor> {
    let mut found: Vec<Anchor> = RELATIVE_ANCHORS
        .iter()
        .filter(|(_, regex, _)| regex.is_match(text))
        .map(|(phrase, _, days)| Anchor {
            days: *days,
            numeric: false,
            phrase: phrase.to_string(),
        })
        .collect();

    for caps in NUMERIC_ANCHOR.captures_iter(text) {
        let Ok(n) = caps[2].parse::<i64>() else {
            continue;
        };
        let unit = caps[3].to_lowercase();
        let multiplier = match unit.as_str() {
            "day" => 1,
            "week" => 7,
            "month" => 30,
            _ => 365,
        };
        let days = if caps.get(1).is_some() { n * multiplier } else { -n * multiplier };
        found.push(Anchor {
            days,
            numeric: true,
            phrase: caps[0].to_string(),
        });
    }
    found
}

fn phrases(anchors: &[Anchor]) -> String {
    anchors
        .iter()
        .map(|a| a.phrase.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TemporalDriftParams {
    /// Largest tolerated shift, in days
    pub drift_threshold_days: f64,
}

impl Default for TemporalDriftParams {
    fn default() -> Self {
        Self {
            drift_threshold_days: 7.0,
        }
    }
}

pub struct TemporalDriftValidator {
    params: TemporalDriftParams,
}

impl TemporalDriftValidator {
    pub fn new(params: TemporalDriftParams) -> Self {
        Self { params }
    }
}

impl Validator for TemporalDriftValidator {
    fn name(&self) -> &str {
        "temporal_drift"
    }

    fn default_thresholds(&self) -> Thresholds {
        Thresholds {
            support: SAME_EVENT_OVERLAP,
            refute: 0.5,
        }
    }

    fn assess(
        &self,
        claim: &Claim,
        evidence: &[EvidenceSpan],
        _source: &str,
    ) -> Result<Assessment, ValidatorError> {
        let evidence_text = joined_text(evidence);
        let claimed = anchors(&claim.text);
        let observed = anchors(&evidence_text);

        if claimed.is_empty() {
            return Ok(Assessment::entailment(0.5, "No temporal reference in claim"));
        }

        if observed.is_empty() {
            let claim_words = content_set(&claim.text);
            let evidence_words = content_set(&evidence_text);
            let overlap = if claim_words.is_empty() {
                0.0
            } else {
                claim_words.intersection(&evidence_words).count() as f64 / claim_words.len() as f64
            };
            if overlap > SAME_EVENT_OVERLAP {
                return Ok(Assessment::entailment(
                    overlap,
                    format!(
                        "Claim dates the event ({}) but evidence does not; overlap {:.0}% suggests the same event",
                        phrases(&claimed),
                        overlap * 100.0
                    ),
                ));
            }
            return Ok(Assessment::neutral(
                1.0 - overlap,
                format!("Claim dates the event ({}) but evidence does not", phrases(&claimed)),
            ));
        }

        let symbolic = claimed.iter().chain(observed.iter()).all(|a| !a.numeric);
        if symbolic {
            let mut a: Vec<i64> = claimed.iter().map(|x| x.days).collect();
            let mut b: Vec<i64> = observed.iter().map(|x| x.days).collect();
            a.sort_unstable();
            a.dedup();
            b.sort_unstable();
            b.dedup();
            if a != b {
                return Ok(Assessment::contradiction(
                    0.8,
                    format!(
                        "Different temporal anchors: claim [{}], evidence [{}]",
                        phrases(&claimed),
                        phrases(&observed)
                    ),
                ));
            }
        }

        // The first evidence anchor is the nearest to the retrieved passage.
        let claim_avg = claimed.iter().map(|a| a.days as f64).sum::<f64>() / claimed.len() as f64;
        let drift = (claim_avg - observed[0].days as f64).abs();
        let threshold = self.params.drift_threshold_days;

        if drift > threshold {
            return Ok(Assessment::contradiction(
                0.9,
                format!(
                    "Temporal drift of {:.0} day(s): claim [{}], evidence [{}]",
                    drift,
                    phrases(&claimed),
                    phrases(&observed)
                ),
            ));
        }

        let confidence = if threshold > 0.0 {
            1.0 - 0.5 * drift / threshold
        } else {
            1.0
        };
        Ok(Assessment::entailment(
            confidence,
            format!("Temporal alignment OK ({:.0} day(s) apart)", drift),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Verdict;
    use crate::validators::ConfiguredValidator;

    fn check(claim: &str, evidence: &str) -> Verdict {
        let v = ConfiguredValidator::new(Box::new(TemporalDriftValidator::new(
            TemporalDriftParams::default(),
        )));
        let spans = vec![EvidenceSpan::from_document(evidence, 0, evidence.len(), 0.5, "bm25")];
        v.validate(&Claim::new("history", 0, claim), &spans, evidence)
            .unwrap()
            .verdict
    }

    #[test]
    fn test_anchor_extraction() {
        let found = anchors("Fell yesterday, seen 3 days ago, review in 2 weeks");
        let days: Vec<i64> = found.iter().map(|a| a.days).collect();
        assert_eq!(days, vec![-1, -3, 14]);
    }

    #[test]
    fn test_last_night_is_not_tonight() {
        let days: Vec<i64> = anchors("pain started last night").iter().map(|a| a.days).collect();
        assert_eq!(days, vec![-1]);
    }

    #[test]
    fn test_symbolic_mismatch_refutes() {
        assert_eq!(check("Fell yesterday", "She fell last week at home."), Verdict::Refuted);
    }

    #[test]
    fn test_large_numeric_drift_refutes() {
        assert_eq!(check("Pain began 2 days ago", "Pain began 3 weeks ago."), Verdict::Refuted);
    }

    #[test]
    fn test_small_numeric_drift_supports() {
        assert_eq!(check("Pain began 2 days ago", "Pain began 4 days ago."), Verdict::Supported);
    }

    #[test]
    fn test_undated_claim_supports() {
        assert_eq!(check("Pain in left knee", "Left knee pain since last week."), Verdict::Supported);
    }

    #[test]
    fn test_undated_evidence_uses_overlap() {
        assert_eq!(check("Knee pain yesterday", "Knee pain noted."), Verdict::Supported);
        assert_eq!(
            check("Fever spikes yesterday", "Knee pain noted."),
            Verdict::InsufficientEvidence
        );
    }
}
