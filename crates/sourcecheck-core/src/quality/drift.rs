//! Temporal and numeric drift between a claim and its top evidence.
//!
//! Flags evidence time context the claim drops ("this morning"), evidence
//! measurements the claim omits, and measurements whose values differ by
//! more than `tolerance_percent`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{context_snippet, QualityModule};
use crate::config::ConfigError;
use crate::text::{snippet, MEASUREMENT_PATTERN};
use crate::types::{Disposition, IssueKind, QualityIssue, Severity};

lazy_static! {
    static ref TEMPORAL_PHRASES: Vec<Regex> = [
        "earlier today",
        "this morning",
        "this afternoon",
        "this evening",
        "tonight",
        "yesterday",
        "last night",
        "last week",
        "last month",
        "last year",
        "today",
        "tomorrow",
        "recently",
    ]
    .iter()
    .map(|p| Regex::new(&format!(r"(?i)\b{}\b", p)).unwrap())
    .collect();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TemporalNumericDriftParams {
    /// Largest relative difference, in percent, still treated as equal
    pub tolerance_percent: f64,

    pub check_temporal: bool,
    pub check_numeric: bool,

    pub max_issues: usize,

    /// Only inspect dispositions whose validator agreement is below this
    pub min_agreement: Option<f64>,
}

impl Default for TemporalNumericDriftParams {
    fn default() -> Self {
        Self {
            tolerance_percent: 10.0,
            check_temporal: true,
            check_numeric: true,
            max_issues: 3,
            min_agreement: None,
        }
    }
}

pub struct TemporalNumericDriftModule {
    params: TemporalNumericDriftParams,
}

/// A number with its normalised unit.
#[derive(Debug, Clone, PartialEq)]
struct Measurement {
    value: String,
    unit: String,
}

impl Measurement {
    fn label(&self) -> String {
        format!("{} {}", self.value, self.unit)
    }
}

fn measurements(text: &str) -> Vec<Measurement> {
    let mut found: Vec<Measurement> = Vec::new();
    for caps in MEASUREMENT_PATTERN.captures_iter(text) {
        let unit = caps[2].to_lowercase();
        let unit = match unit.as_str() {
            "year" | "month" | "week" | "day" | "hour" | "minute" => format!("{}s", unit),
            "lb" => "lbs".to_string(),
            _ => unit,
        };
        let m = Measurement {
            value: caps[1].to_string(),
            unit,
        };
        if !found.contains(&m) {
            found.push(m);
        }
    }
    found
}

impl TemporalNumericDriftModule {
    pub fn new(params: TemporalNumericDriftParams) -> Result<Self, ConfigError> {
        if !(params.tolerance_percent >= 0.0) {
            return Err(ConfigError::invalid(
                "temporal_numeric_drift.tolerance_percent",
                "must be non-negative",
            ));
        }
        Ok(Self { params })
    }

    fn values_match(&self, a: &str, b: &str) -> bool {
        match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(x), Ok(y)) => {
                if x == 0.0 && y == 0.0 {
                    return true;
                }
                let diff_percent = (x - y).abs() / x.abs().max(y.abs()) * 100.0;
                diff_percent <= self.params.tolerance_percent
            }
            _ => a == b,
        }
    }

    fn temporal_issues(&self, claim: &str, evidence: &str) -> Vec<QualityIssue> {
        let claim_lower = claim.to_lowercase();
        let mut seen: Vec<String> = Vec::new();
        for regex in TEMPORAL_PHRASES.iter() {
            for m in regex.find_iter(evidence) {
                let phrase = m.as_str().to_lowercase();
                if !claim_lower.contains(&phrase) && !seen.contains(&phrase) {
                    seen.push(phrase);
                }
            }
        }
        // "today" inside an omitted "earlier today" is the same omission
        let reported: Vec<String> = seen
            .iter()
            .filter(|p| !seen.iter().any(|other| other != *p && other.contains(p.as_str())))
            .cloned()
            .collect();

        reported
            .into_iter()
            .map(|phrase| {
                QualityIssue::new(
                    self.name(),
                    IssueKind::TemporalDrift,
                    Severity::Medium,
                    format!("Evidence specifies temporal context '{}' but claim omits it", phrase),
                )
                .with_evidence(context_snippet(evidence, &phrase))
                .with_claim(snippet(claim, 100))
                .with_suggestion(format!("Consider adding temporal context: '{}'", phrase))
            })
            .collect()
    }

    fn numeric_issues(&self, claim: &str, evidence: &str) -> Vec<QualityIssue> {
        let claimed = measurements(claim);
        let mut issues = Vec::new();

        for observed in measurements(evidence) {
            let same_unit: Vec<&Measurement> = claimed.iter().filter(|c| c.unit == observed.unit).collect();
            let Some(first) = same_unit.first() else {
                issues.push(
                    QualityIssue::new(
                        self.name(),
                        IssueKind::NumericDrift,
                        Severity::Medium,
                        format!(
                            "Evidence specifies '{}' but claim omits this measurement",
                            observed.label()
                        ),
                    )
                    .with_evidence(context_snippet(evidence, &observed.value))
                    .with_claim(snippet(claim, 100))
                    .with_suggestion(format!("Consider including: '{}'", observed.label())),
                );
                continue;
            };

            if same_unit.iter().any(|c| self.values_match(&observed.value, &c.value)) {
                continue;
            }
            issues.push(
                QualityIssue::new(
                    self.name(),
                    IssueKind::NumericDrift,
                    Severity::High,
                    format!(
                        "Numeric mismatch: evidence says '{}' but claim says '{}'",
                        observed.label(),
                        first.label()
                    ),
                )
                .with_evidence(context_snippet(evidence, &observed.value))
                .with_claim(context_snippet(claim, &first.value))
                .with_suggestion(format!(
                    "Verify the correct value: '{}' or '{}'",
                    observed.label(),
                    first.label()
                )),
            );
        }
        issues
    }
}

impl QualityModule for TemporalNumericDriftModule {
    fn name(&self) -> &str {
        "temporal_numeric_drift"
    }

    fn should_analyze(&self, disposition: &Disposition) -> bool {
        self.params
            .min_agreement
            .map_or(true, |min| disposition.agreement < min)
    }

    fn analyze(&self, disposition: &Disposition, _source: &str) -> Vec<QualityIssue> {
        let Some(top) = disposition.top_evidence() else {
            return Vec::new();
        };
        let claim = &disposition.claim.text;

        let mut issues = Vec::new();
        if self.params.check_temporal {
            issues.extend(self.temporal_issues(claim, &top.text));
        }
        if self.params.check_numeric {
            issues.extend(self.numeric_issues(claim, &top.text));
        }
        issues.truncate(self.params.max_issues);
        issues
    }
}
