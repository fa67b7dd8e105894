//! Quality analysis for claims that were not refuted.
//!
//! A quality module inspects one disposition and reports [`QualityIssue`]s:
//! drift, omission, fabrication. Modules never touch the verdict. The
//! analyzer multiplies one severity penalty per issue into the quality
//! score, so the result does not depend on module or issue order.

mod drift;
mod semantic;

pub use drift::{TemporalNumericDriftModule, TemporalNumericDriftParams};
pub use semantic::{SemanticQualityModule, SemanticQualityParams};

use crate::config::{parse_params, ConfigError, QualityModuleSpec, SeverityPenalties};
use crate::text::snippet;
use crate::types::{Disposition, QualityIssue, Severity, Verdict};

/// Characters of context kept either side of a phrase in issue snippets.
const SNIPPET_CONTEXT: usize = 40;

/// Length of a snippet when the phrase is not found.
const SNIPPET_FALLBACK: usize = 100;

/// One defect detector.
pub trait QualityModule: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this disposition is worth inspecting at all.
    fn should_analyze(&self, _disposition: &Disposition) -> bool {
        true
    }

    /// Issues found for the disposition, at most the module's cap.
    fn analyze(&self, disposition: &Disposition, source: &str) -> Vec<QualityIssue>;
}

/// Issues and the score they imply for one disposition.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityAssessment {
    pub issues: Vec<QualityIssue>,
    pub quality_score: f64,
}

/// Product of one severity penalty per issue, clamped to [0, 1].
pub fn quality_score<'a>(
    issues: impl IntoIterator<Item = &'a QualityIssue>,
    penalties: &SeverityPenalties,
) -> f64 {
    issues
        .into_iter()
        .map(|issue| match issue.severity {
            Severity::High => penalties.high,
            Severity::Medium => penalties.medium,
            Severity::Low => penalties.low,
        })
        .product::<f64>()
        .clamp(0.0, 1.0)
}

/// Runs every configured module over a disposition.
pub struct QualityAnalyzer {
    modules: Vec<Box<dyn QualityModule>>,
    penalties: SeverityPenalties,
}

impl QualityAnalyzer {
    pub fn new(modules: Vec<Box<dyn QualityModule>>, penalties: SeverityPenalties) -> Self {
        Self { modules, penalties }
    }

    /// Build modules from policy specs.
    pub fn from_specs(
        specs: &[QualityModuleSpec],
        penalties: SeverityPenalties,
    ) -> Result<Self, ConfigError> {
        let modules = specs.iter().map(build_module).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(modules, penalties))
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn analyze(&self, disposition: &Disposition, source: &str) -> QualityAssessment {
        if disposition.verdict == Verdict::Refuted {
            return QualityAssessment {
                issues: Vec::new(),
                quality_score: 1.0,
            };
        }

        let issues: Vec<QualityIssue> = self
            .modules
            .iter()
            .filter(|m| m.should_analyze(disposition))
            .flat_map(|m| m.analyze(disposition, source))
            .collect();
        let quality_score = quality_score(&issues, &self.penalties);

        if !issues.is_empty() {
            tracing::debug!(
                claim = %disposition.claim.id,
                issues = issues.len(),
                quality_score,
                "quality issues found"
            );
        }
        QualityAssessment {
            issues,
            quality_score,
        }
    }

    /// Attach issues and score to the disposition.
    pub fn apply(&self, mut disposition: Disposition, source: &str) -> Disposition {
        let assessment = self.analyze(&disposition, source);
        disposition.quality_score = assessment.quality_score;
        disposition.quality_issues = assessment.issues;
        disposition
    }
}

impl std::fmt::Debug for QualityAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityAnalyzer")
            .field("modules", &self.module_names())
            .field("penalties", &self.penalties)
            .finish()
    }
}

/// Module registry.
pub fn build_module(spec: &QualityModuleSpec) -> Result<Box<dyn QualityModule>, ConfigError> {
    match spec.name.as_str() {
        "temporal_numeric_drift" => {
            let params: TemporalNumericDriftParams = parse_params(&spec.name, &spec.params)?;
            Ok(Box::new(TemporalNumericDriftModule::new(params)?))
        }
        "semantic_quality" => {
            let params: SemanticQualityParams = parse_params(&spec.name, &spec.params)?;
            Ok(Box::new(SemanticQualityModule::new(params)?))
        }
        other => Err(ConfigError::UnknownQualityModule(other.to_string())),
    }
}

/// Excerpt of `text` around the first case-insensitive occurrence of
/// `phrase`, with ellipses where cut.
pub(crate) fn context_snippet(text: &str, phrase: &str) -> String {
    let needle = phrase.trim_matches('"').to_lowercase();
    let lower = text.to_lowercase();
    // Lower-casing can shift byte offsets outside ASCII.
    let found = if lower.len() == text.len() && !needle.is_empty() {
        lower.find(&needle)
    } else {
        None
    };
    let Some(pos) = found else {
        return snippet(text, SNIPPET_FALLBACK);
    };

    let mut start = pos.saturating_sub(SNIPPET_CONTEXT);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (pos + needle.len() + SNIPPET_CONTEXT).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }

    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(&text[start..end]);
    if end < text.len() {
        out.push_str("...");
    }
    out
}

/// Drop case-insensitive duplicates, keeping first occurrences.
pub(crate) fn dedup_ci(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceSpan;
    use crate::types::{Claim, IssueKind};
    use proptest::prelude::*;

    fn issue(severity: Severity) -> QualityIssue {
        QualityIssue::new("test", IssueKind::Omission, severity, "x")
    }

    fn disposition(verdict: Verdict, claim: &str, evidence: &str) -> Disposition {
        Disposition {
            claim: Claim::new("history", 0, claim),
            verdict,
            confidence: 0.8,
            evidence: vec![EvidenceSpan::from_document(evidence, 0, evidence.len(), 0.5, "bm25")],
            validators: vec!["nli".to_string()],
            explanation: String::new(),
            validator_results: None,
            agreement: 1.0,
            resolved_by: None,
            quality_score: 1.0,
            quality_issues: Vec::new(),
        }
    }

    #[test]
    fn test_high_and_low_compound() {
        let issues = [issue(Severity::High), issue(Severity::Low)];
        let score = quality_score(&issues, &SeverityPenalties::default());
        assert!((score - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_no_issues_scores_one() {
        assert_eq!(quality_score(&[], &SeverityPenalties::default()), 1.0);
    }

    #[test]
    fn test_unknown_module_rejected() {
        let err = QualityAnalyzer::from_specs(
            &[QualityModuleSpec::named("vibes")],
            SeverityPenalties::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownQualityModule(name) if name == "vibes"));
    }

    #[test]
    fn test_bad_params_rejected() {
        let spec = QualityModuleSpec {
            name: "semantic_quality".to_string(),
            params: serde_json::json!({ "max_issue": 2 }),
        };
        assert!(matches!(
            build_module(&spec),
            Err(ConfigError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_refuted_is_not_analyzed() {
        let analyzer = QualityAnalyzer::from_specs(
            &[QualityModuleSpec::named("temporal_numeric_drift")],
            SeverityPenalties::default(),
        )
        .unwrap();
        let d = disposition(Verdict::Refuted, "wound 2 cm", "Wound measures 5 cm.");
        let out = analyzer.apply(d, "Wound measures 5 cm.");
        assert!(out.quality_issues.is_empty());
        assert_eq!(out.quality_score, 1.0);
        assert_eq!(out.verdict, Verdict::Refuted);
    }

    #[test]
    fn test_apply_keeps_verdict_and_scores() {
        let analyzer = QualityAnalyzer::from_specs(
            &[
                QualityModuleSpec::named("temporal_numeric_drift"),
                QualityModuleSpec::named("semantic_quality"),
            ],
            SeverityPenalties::default(),
        )
        .unwrap();
        let evidence = "Wound measures 5 cm since yesterday.";
        let d = disposition(Verdict::Supported, "Wound measures 2 cm", evidence);
        let out = analyzer.apply(d, evidence);
        assert_eq!(out.verdict, Verdict::Supported);
        assert!(out.quality_issues.iter().any(|i| i.kind == IssueKind::NumericDrift));
        assert!(out.quality_issues.iter().any(|i| i.kind == IssueKind::TemporalDrift));
        assert!(out.quality_score < 0.5);
    }

    #[test]
    fn test_context_snippet() {
        let text = "a".repeat(60) + " fever " + &"b".repeat(60);
        let s = context_snippet(&text, "fever");
        assert!(s.starts_with("...") && s.ends_with("..."));
        assert!(s.contains("fever"));
        assert_eq!(context_snippet("short text", "\"short\""), "short text");
        assert_eq!(context_snippet("short text", "missing"), "short text");
    }

    fn severity() -> impl proptest::strategy::Strategy<Value = Severity> {
        prop_oneof![Just(Severity::High), Just(Severity::Medium), Just(Severity::Low)]
    }

    proptest! {
        #[test]
        fn prop_score_is_order_independent(severities in proptest::collection::vec(severity(), 0..8)) {
            let penalties = SeverityPenalties::default();
            let issues: Vec<QualityIssue> = severities.iter().map(|s| issue(*s)).collect();
            let mut reversed = issues.clone();
            reversed.reverse();

            let a = quality_score(&issues, &penalties);
            let b = quality_score(&reversed, &penalties);
            prop_assert!((a - b).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&a));

            let (left, right) = issues.split_at(issues.len() / 2);
            let split = quality_score(left, &penalties) * quality_score(right, &penalties);
            prop_assert!((a - split).abs() < 1e-12);
        }
    }
}
