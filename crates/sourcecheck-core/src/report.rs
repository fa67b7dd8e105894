//! The verification report and the scores derived from dispositions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::config::{ExtractionSchema, ScoringConfig, ScoringMethod};
use crate::types::{Disposition, QualityIssue, Verdict};

/// Number of claims per verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub supported: usize,
    pub refuted: usize,
    pub insufficient_evidence: usize,
}

impl VerdictCounts {
    fn add(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Supported => self.supported += 1,
            Verdict::Refuted => self.refuted += 1,
            Verdict::InsufficientEvidence => self.insufficient_evidence += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.supported + self.refuted + self.insufficient_evidence
    }

    /// Fraction supported, 0.0 with no claims.
    pub fn support_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.supported as f64 / n as f64,
        }
    }
}

/// Per-field roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBreakdown {
    pub claims: usize,
    pub counts: VerdictCounts,
    pub support_rate: f64,
    pub mean_quality: f64,
}

/// Schema fields the record failed to cover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletenessFindings {
    /// Verifiable schema fields that produced no claims
    pub fields_without_claims: Vec<String>,

    /// Required fields missing from the record or empty
    pub missing_required: Vec<String>,

    /// Share of verifiable schema fields that produced claims
    pub score: f64,
}

impl CompletenessFindings {
    pub fn assess(
        schema: &ExtractionSchema,
        fields: &BTreeMap<String, String>,
        dispositions: &[Disposition],
    ) -> Self {
        let mut fields_without_claims = Vec::new();
        let mut verifiable = 0usize;
        for (name, _) in schema.verifiable_fields() {
            verifiable += 1;
            if !dispositions.iter().any(|d| &d.claim.field == name) {
                fields_without_claims.push(name.clone());
            }
        }

        let missing_required = schema
            .fields
            .iter()
            .filter(|(_, spec)| spec.required)
            .filter(|(name, _)| fields.get(*name).map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| name.clone())
            .collect();

        let score = if verifiable == 0 {
            1.0
        } else {
            (verifiable - fields_without_claims.len()) as f64 / verifiable as f64
        };

        Self {
            fields_without_claims,
            missing_required,
            score,
        }
    }
}

/// Outcome of verifying one record against one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// One per claim, in extraction order
    pub dispositions: Vec<Disposition>,

    /// Claim score by the configured method, blended with completeness
    pub overall_score: f64,

    /// Mean disposition quality score (1.0 with no claims)
    pub quality_score: f64,

    pub counts: VerdictCounts,
    pub support_rate: f64,

    pub fields: BTreeMap<String, FieldBreakdown>,
    pub completeness: CompletenessFindings,

    /// Claims not processed before a deadline, by claim id
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub abandoned: Vec<String>,

    pub verified_at: DateTime<Utc>,
}

impl VerificationReport {
    /// Score dispositions and roll them up.
    pub fn assemble(
        dispositions: Vec<Disposition>,
        fields: &BTreeMap<String, String>,
        schema: &ExtractionSchema,
        scoring: &ScoringConfig,
    ) -> Self {
        let mut counts = VerdictCounts::default();
        let mut per_field: BTreeMap<String, Vec<&Disposition>> = BTreeMap::new();
        for d in &dispositions {
            counts.add(d.verdict);
            per_field.entry(d.claim.field.clone()).or_default().push(d);
        }

        let breakdown = per_field
            .into_iter()
            .map(|(field, ds)| {
                let mut field_counts = VerdictCounts::default();
                ds.iter().for_each(|d| field_counts.add(d.verdict));
                let mean_quality = ds.iter().map(|d| d.quality_score).sum::<f64>() / ds.len() as f64;
                let entry = FieldBreakdown {
                    claims: ds.len(),
                    counts: field_counts,
                    support_rate: field_counts.support_rate(),
                    mean_quality,
                };
                (field, entry)
            })
            .collect();

        let completeness = CompletenessFindings::assess(schema, fields, &dispositions);
        let claim_score = claim_score(&dispositions, schema, scoring.method);
        let w = scoring.completeness_weight;
        let overall_score = ((1.0 - w) * claim_score + w * completeness.score).clamp(0.0, 1.0);

        let quality_score = if dispositions.is_empty() {
            1.0
        } else {
            dispositions.iter().map(|d| d.quality_score).sum::<f64>() / dispositions.len() as f64
        };

        Self {
            support_rate: counts.support_rate(),
            dispositions,
            overall_score,
            quality_score,
            counts,
            fields: breakdown,
            completeness,
            abandoned: Vec::new(),
            verified_at: Utc::now(),
        }
    }

    /// One flat row per claim.
    pub fn flat_records(&self) -> Vec<FlatClaimRecord> {
        self.dispositions.iter().map(FlatClaimRecord::from).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary; `detailed` adds evidence and explanations.
    pub fn render_text(&self, detailed: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Verification report ({})", self.verified_at.to_rfc3339());
        let _ = writeln!(out, "Overall score: {:.3}", self.overall_score);
        let _ = writeln!(out, "Quality score: {:.3}", self.quality_score);
        let _ = writeln!(
            out,
            "Claims: {} supported, {} refuted, {} insufficient evidence",
            self.counts.supported, self.counts.refuted, self.counts.insufficient_evidence
        );

        for d in &self.dispositions {
            let _ = writeln!(
                out,
                "\n[{}] {} ({:.2}) {}",
                d.claim.id, d.verdict, d.confidence, d.claim.text
            );
            if detailed {
                let _ = writeln!(out, "  {}", d.explanation);
                if let Some(rule) = &d.resolved_by {
                    let _ = writeln!(out, "  resolved by: {}", rule);
                }
                for span in &d.evidence {
                    let _ = writeln!(out, "  evidence {} ({:.2}): {}", span.pointer(), span.score, span.text);
                }
            }
            for issue in &d.quality_issues {
                let _ = writeln!(out, "  {:?} {:?}: {}", issue.severity, issue.kind, issue.detail);
            }
        }

        let c = &self.completeness;
        if !c.fields_without_claims.is_empty() {
            let _ = writeln!(out, "\nFields without claims: {}", c.fields_without_claims.join(", "));
        }
        if !c.missing_required.is_empty() {
            let _ = writeln!(out, "Missing required fields: {}", c.missing_required.join(", "));
        }
        if !self.abandoned.is_empty() {
            let _ = writeln!(out, "Abandoned claims: {}", self.abandoned.join(", "));
        }
        out
    }
}

fn claim_score(dispositions: &[Disposition], schema: &ExtractionSchema, method: ScoringMethod) -> f64 {
    if dispositions.is_empty() {
        return 0.0;
    }
    let supported = |d: &&Disposition| d.verdict == Verdict::Supported;
    match method {
        ScoringMethod::Simple => {
            dispositions.iter().filter(supported).count() as f64 / dispositions.len() as f64
        }
        ScoringMethod::QualityWeighted => {
            dispositions
                .iter()
                .filter(supported)
                .map(|d| d.quality_score)
                .sum::<f64>()
                / dispositions.len() as f64
        }
        ScoringMethod::CriticalityWeighted => {
            let weight = |d: &Disposition| {
                schema
                    .fields
                    .get(&d.claim.field)
                    .map(|spec| schema.criticality_weights.weight(spec.criticality))
                    .unwrap_or(0.0)
            };
            let total: f64 = dispositions.iter().map(weight).sum();
            if total <= 0.0 {
                return 0.0;
            }
            dispositions.iter().filter(supported).map(|d| weight(d)).sum::<f64>() / total
        }
    }
}

/// Evidence as it appears in a flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatEvidence {
    pub text: String,
    pub score: f64,
}

/// A claim's outcome without nesting, for external reporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatClaimRecord {
    pub claim_id: String,
    pub field: String,
    pub text: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub evidence: Vec<FlatEvidence>,
    pub validators: Vec<String>,
    pub quality_score: f64,
    pub issues: Vec<QualityIssue>,
}

impl From<&Disposition> for FlatClaimRecord {
    fn from(d: &Disposition) -> Self {
        Self {
            claim_id: d.claim.id.clone(),
            field: d.claim.field.clone(),
            text: d.claim.text.clone(),
            verdict: d.verdict,
            confidence: d.confidence,
            evidence: d
                .evidence
                .iter()
                .map(|e| FlatEvidence {
                    text: e.text.clone(),
                    score: e.score,
                })
                .collect(),
            validators: d.validators.clone(),
            quality_score: d.quality_score,
            issues: d.quality_issues.clone(),
        }
    }
}
