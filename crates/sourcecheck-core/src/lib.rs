//! # sourcecheck-core
//!
//! Deterministic claim verification against a source document.
//!
//! Given a structured record (e.g. a generated visit summary) and the text
//! it was derived from (e.g. a transcript), this crate answers, per claim:
//! - Is it supported, refuted, or is there insufficient evidence?
//! - Which evidence and which validators decided that?
//! - Is a supported claim still lossy (drifted numbers, omitted context)?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same report (timestamp aside)
//! 2. **Total**: Every claim resolves to exactly one of three verdicts
//! 3. **Fail fast**: Configuration errors surface when the [`Checker`] is built;
//!    `verify` itself cannot fail
//! 4. **Explainable**: Every disposition carries its evidence, the agreeing
//!    validators and an explanation
//!
//! ## Example
//!
//! ```rust,ignore
//! use sourcecheck_core::{Checker, ExtractionSchema, PolicyConfig, RetrieverCache};
//! use std::sync::Arc;
//!
//! let schema = ExtractionSchema::from_yaml_file("schema.yaml")?;
//! let policy = PolicyConfig::from_yaml_file("policy.yaml")?;
//! let checker = Checker::new(&schema, &policy, Arc::new(RetrieverCache::default()))?;
//!
//! let report = checker.verify(&transcript, &fields);
//! for d in &report.dispositions {
//!     println!("{} {} ({:.2})", d.claim.id, d.verdict, d.confidence);
//! }
//! ```

pub mod arbitration;
pub mod checker;
pub mod config;
pub mod evidence;
pub mod extract;
pub mod quality;
pub mod report;
pub mod retrieval;
pub mod text;
pub mod types;
pub mod validators;

// Re-export main types at crate root
pub use arbitration::Arbiter;
pub use checker::{verify, Checker, ClaimStage};
pub use config::{
    AggregationConfig, ConfigError, ExtractionSchema, FieldSpec, PolicyConfig, QualityModuleSpec,
    ScoringMethod, Strategy, ValidatorSpec,
};
pub use evidence::EvidenceSpan;
pub use extract::{extract, ClaimExtractor};
pub use quality::{QualityAnalyzer, QualityAssessment, QualityModule};
pub use report::{CompletenessFindings, FieldBreakdown, FlatClaimRecord, VerdictCounts, VerificationReport};
pub use retrieval::{CacheStats, Embedder, RetrievalContext, Retriever, RetrieverCache, RetrieverIndex, RetrieverSettings};
pub use types::{
    Claim, ClaimMetadata, ConflictHint, Disposition, ExtractionMethod, IssueKind, QualityIssue,
    Severity, ValidatorResult, Verdict,
};
pub use validators::{build_validator, ConfiguredValidator, EntailmentModel, ModelSet, Validator, ValidatorError};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const TRANSCRIPT: &str = "Doctor: What brings you in today?\n\
        Patient: I slipped on the wet floor at work this morning and cut my arm.\n\
        Doctor: Any other symptoms? Patient: No dizziness, no fever.\n\
        Doctor: The laceration is 3 cm long. I will close it with sutures.\n\
        Doctor: Take ibuprofen 400 mg as needed. Follow up in 2 weeks.";

    const SCHEMA: &str = r#"
version: "1.0"
fields:
  chief_complaint:
    method: single_value
    criticality: critical
    required: true
  symptoms:
    method: delimited
    delimiter: comma
    criticality: high
  plan:
    method: bullet_list
    fallback: sentence_split
  alerts:
    method: skip
"#;

    const POLICY: &str = r#"
version: "1.0"
retriever: bm25
validators:
  symptoms:
    - name: nli
    - name: lexical_coverage
      weight: 0.5
default_validators:
  - name: nli
  - name: lexical_coverage
aggregation:
  strategy: weighted_voting
  explain_conflicts: true
quality_modules:
  - name: temporal_numeric_drift
  - name: semantic_quality
    params:
      max_issues: 2
scoring:
  method: quality_weighted
"#;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn checker() -> Checker {
        let schema = ExtractionSchema::from_yaml(SCHEMA).unwrap();
        let policy = PolicyConfig::from_yaml(POLICY).unwrap();
        Checker::new(&schema, &policy, Arc::new(RetrieverCache::default())).unwrap()
    }

    #[test]
    fn test_end_to_end_visit_summary() {
        let report = checker().verify(
            TRANSCRIPT,
            &fields(&[
                ("chief_complaint", "Cut arm after slipping on wet floor"),
                ("symptoms", "no dizziness, fever"),
                ("plan", "Close laceration with sutures. Follow up in 2 weeks."),
                ("alerts", "none"),
            ]),
        );

        let ids: Vec<&str> = report.dispositions.iter().map(|d| d.claim.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["chief_complaint#0", "plan#0", "plan#1", "symptoms#0", "symptoms#1"]
        );

        let plan = &report.dispositions[1];
        assert_eq!(plan.claim.metadata.degraded_from, Some(ExtractionMethod::BulletList));

        let by_id = |id: &str| report.dispositions.iter().find(|d| d.claim.id == id).unwrap();
        assert_eq!(by_id("symptoms#0").verdict, Verdict::Supported);
        assert_eq!(by_id("symptoms#1").verdict, Verdict::Refuted);
        assert!(by_id("symptoms#1").validator_results.is_some());

        for d in &report.dispositions {
            assert!(Verdict::DEFAULT_PRIORITY.contains(&d.verdict));
            assert!(d.evidence.iter().all(|e| e.matches_document(TRANSCRIPT)));
            assert!((0.0..=1.0).contains(&d.quality_score));
        }

        assert!(report.completeness.fields_without_claims.is_empty());
        assert!((0.0..=1.0).contains(&report.overall_score));
        assert_eq!(report.flat_records().len(), report.dispositions.len());
    }

    #[test]
    fn test_quality_issue_on_supported_claim() {
        let report = checker().verify(TRANSCRIPT, &fields(&[("chief_complaint", "Slipped at work and cut arm")]));
        let d = &report.dispositions[0];
        assert_eq!(d.verdict, Verdict::Supported);
        assert!(d
            .quality_issues
            .iter()
            .any(|i| i.kind == IssueKind::TemporalDrift && i.detail.contains("this morning")));
        assert!(d.quality_score < 1.0);
        assert!(report.overall_score < 1.0);
    }

    #[test]
    fn test_missing_required_field_reported() {
        let report = checker().verify(TRANSCRIPT, &fields(&[("symptoms", "no fever")]));
        assert_eq!(report.completeness.missing_required, vec!["chief_complaint"]);
        assert!(report
            .completeness
            .fields_without_claims
            .contains(&"plan".to_string()));
    }

    #[test]
    fn test_repeat_verification_is_deterministic() {
        let checker = checker();
        let record = fields(&[("symptoms", "no dizziness, fever"), ("plan", "Sutures. Ibuprofen 400 mg.")]);
        let a = checker.verify(TRANSCRIPT, &record);
        let b = checker.verify(TRANSCRIPT, &record);
        assert_eq!(a.dispositions, b.dispositions);
        assert_eq!(a.overall_score, b.overall_score);
        assert_eq!(checker.cache_stats().builds, 1);
    }
}
