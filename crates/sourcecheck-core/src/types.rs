//! Core types shared by every pipeline stage.
//!
//! Claims flow in from the extractor, validator results flow out of the
//! validators, and a [`Disposition`] is what arbitration hands to the
//! quality analyzer and finally to the report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::evidence::EvidenceSpan;

/// The three-way verdict every claim resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supported,
    Refuted,
    InsufficientEvidence,
}

impl Verdict {
    /// All verdicts in default priority order.
    pub const DEFAULT_PRIORITY: [Verdict; 3] = [
        Verdict::Refuted,
        Verdict::Supported,
        Verdict::InsufficientEvidence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Supported => "supported",
            Verdict::Refuted => "refuted",
            Verdict::InsufficientEvidence => "insufficient_evidence",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a field value is turned into claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    #[default]
    SingleValue,
    Delimited,
    BulletList,
    Structured,
    SentenceSplit,
    Skip,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionMethod::SingleValue => "single_value",
            ExtractionMethod::Delimited => "delimited",
            ExtractionMethod::BulletList => "bullet_list",
            ExtractionMethod::Structured => "structured",
            ExtractionMethod::SentenceSplit => "sentence_split",
            ExtractionMethod::Skip => "skip",
        };
        f.write_str(name)
    }
}

/// Extraction audit trail attached to each claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimMetadata {
    /// Method that actually produced the claim
    pub method: ExtractionMethod,

    /// Method the schema asked for
    pub requested_method: ExtractionMethod,

    /// Set when the requested method found nothing and a fallback ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_from: Option<ExtractionMethod>,

    /// Resolved delimiter for `delimited` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,

    /// Pattern for `structured` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Named captures from a `structured` match
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub captures: BTreeMap<String, String>,

    /// Position of the segment within its field
    pub source_index: usize,
}

/// An atomic, independently verifiable assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// `<field>#<index>`
    pub id: String,

    /// Field the claim was extracted from
    pub field: String,

    /// Claim text
    pub text: String,

    pub metadata: ClaimMetadata,
}

impl Claim {
    /// A claim with plain `single_value` metadata, mostly useful in tests
    /// and for callers that already have atomic claims.
    pub fn new(field: impl Into<String>, index: usize, text: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            id: format!("{}#{}", field, index),
            field,
            text: text.into(),
            metadata: ClaimMetadata {
                method: ExtractionMethod::SingleValue,
                requested_method: ExtractionMethod::SingleValue,
                degraded_from: None,
                delimiter: None,
                pattern: None,
                captures: BTreeMap::new(),
                source_index: index,
            },
        }
    }

    /// Whether extraction had to fall back.
    pub fn is_degraded(&self) -> bool {
        self.metadata.degraded_from.is_some()
    }
}

/// Arbitration hint a validator may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictHint {
    PreferSupport,
    PreferRefute,
    #[default]
    Neutral,
}

/// Output of one validator for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorResult {
    /// Validator that produced this result
    pub validator: String,

    pub verdict: Verdict,

    /// Confidence in the verdict (0.0 - 1.0)
    pub confidence: f64,

    pub explanation: String,

    /// Weight declared on the validator spec, overriding aggregation defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(default)]
    pub on_conflict: ConflictHint,

    /// Set when the validator failed internally; such results never vote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidatorResult {
    pub fn new(
        validator: impl Into<String>,
        verdict: Verdict,
        confidence: f64,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            validator: validator.into(),
            verdict,
            confidence: confidence.clamp(0.0, 1.0),
            explanation: explanation.into(),
            weight: None,
            on_conflict: ConflictHint::Neutral,
            error: None,
        }
    }

    /// Result recorded for a validator that raised.
    pub fn failed(validator: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            validator: validator.into(),
            verdict: Verdict::InsufficientEvidence,
            confidence: 0.0,
            explanation: format!("Validator failed: {}", error),
            weight: None,
            on_conflict: ConflictHint::Neutral,
            error: Some(error),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_hint(mut self, hint: ConflictHint) -> Self {
        self.on_conflict = hint;
        self
    }

    /// Whether this result may take part in arbitration.
    pub fn is_usable(&self) -> bool {
        self.error.is_none()
    }
}

/// Severity of a quality issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Defect class a quality module reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    TemporalDrift,
    NumericDrift,
    Omission,
    Fabrication,
}

/// A subtler defect found in an otherwise non-refuted claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub detail: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_snippet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_snippet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// Quality module that raised the issue
    pub module: String,
}

impl QualityIssue {
    pub fn new(
        module: impl Into<String>,
        kind: IssueKind,
        severity: Severity,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            detail: detail.into(),
            evidence_snippet: None,
            claim_snippet: None,
            suggestion: None,
            module: module.into(),
        }
    }

    pub fn with_evidence(mut self, snippet: impl Into<String>) -> Self {
        self.evidence_snippet = Some(snippet.into());
        self
    }

    pub fn with_claim(mut self, snippet: impl Into<String>) -> Self {
        self.claim_snippet = Some(snippet.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Final, explained outcome for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disposition {
    pub claim: Claim,

    pub verdict: Verdict,

    /// Confidence in the final verdict (0.0 - 1.0)
    pub confidence: f64,

    /// Evidence retrieved for the claim, best first. Spans cited by async
    /// agents follow the retrieved ones and carry an `agent:<name>`
    /// retriever instead of a retrieval method.
    pub evidence: Vec<EvidenceSpan>,

    /// Validators whose verdict matches the final one
    pub validators: Vec<String>,

    pub explanation: String,

    /// Every validator result, kept for audit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_results: Option<Vec<ValidatorResult>>,

    /// Share of usable validators agreeing with the verdict
    pub agreement: f64,

    /// Conflict rule that decided the verdict, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,

    /// Multiplicative quality score, 1.0 until analysed
    pub quality_score: f64,

    #[serde(default)]
    pub quality_issues: Vec<QualityIssue>,
}

impl Disposition {
    /// Top evidence span, if any was retrieved.
    pub fn top_evidence(&self) -> Option<&EvidenceSpan> {
        self.evidence.first()
    }

    pub fn is_supported(&self) -> bool {
        self.verdict == Verdict::Supported
    }
}
