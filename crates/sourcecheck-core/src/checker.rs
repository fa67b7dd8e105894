//! The pipeline orchestrator.
//!
//! A [`Checker`] is compiled once from a schema and a policy. Every name
//! in the policy (retriever, validators, quality modules) is resolved at
//! construction, so `verify` itself cannot fail.
//!
//! Each claim moves through the same stages in order:
//!
//! ```text
//! extracted -> evidence_retrieved -> validated (xN) -> arbitrated -> quality_scored -> final
//! ```
//!
//! Empty evidence does not stop a claim; validators see it and report
//! `insufficient_evidence`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::arbitration::Arbiter;
use crate::config::{ConfigError, ExtractionSchema, PolicyConfig};
use crate::evidence::EvidenceSpan;
use crate::extract::ClaimExtractor;
use crate::quality::QualityAnalyzer;
use crate::report::VerificationReport;
use crate::retrieval::{CacheStats, RetrievalContext, RetrieverCache, RetrieverIndex, RetrieverSettings};
use crate::types::{Claim, Disposition, ValidatorResult};
use crate::validators::{build_validator, ConfiguredValidator, ModelSet};

/// Stage a claim is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStage {
    Extracted,
    EvidenceRetrieved,
    Validated,
    Arbitrated,
    QualityScored,
    Final,
}

impl fmt::Display for ClaimStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClaimStage::Extracted => "extracted",
            ClaimStage::EvidenceRetrieved => "evidence_retrieved",
            ClaimStage::Validated => "validated",
            ClaimStage::Arbitrated => "arbitrated",
            ClaimStage::QualityScored => "quality_scored",
            ClaimStage::Final => "final",
        };
        f.write_str(name)
    }
}

fn enter(claim: &Claim, stage: ClaimStage) {
    tracing::debug!(claim = %claim.id, stage = %stage, "claim stage");
}

/// Compiled verification pipeline.
pub struct Checker {
    extractor: ClaimExtractor,
    policy: PolicyConfig,
    retriever: RetrieverSettings,
    field_validators: BTreeMap<String, Vec<ConfiguredValidator>>,
    default_validators: Vec<ConfiguredValidator>,
    arbiter: Arbiter,
    quality: QualityAnalyzer,
    models: ModelSet,
    cache: Arc<RetrieverCache>,
}

impl Checker {
    /// Compile with the default heuristic models.
    pub fn new(
        schema: &ExtractionSchema,
        policy: &PolicyConfig,
        cache: Arc<RetrieverCache>,
    ) -> Result<Self, ConfigError> {
        Self::with_models(schema, policy, cache, ModelSet::default())
    }

    /// Compile with caller-supplied entailment and embedding models.
    pub fn with_models(
        schema: &ExtractionSchema,
        policy: &PolicyConfig,
        cache: Arc<RetrieverCache>,
        models: ModelSet,
    ) -> Result<Self, ConfigError> {
        policy.validate()?;
        let extractor = ClaimExtractor::new(schema)?;
        let retriever = RetrieverSettings::from_parts(&policy.retriever, &policy.retriever_config)?;

        let build_all = |specs: &[crate::config::ValidatorSpec]| {
            specs
                .iter()
                .map(|spec| build_validator(spec, &models))
                .collect::<Result<Vec<_>, _>>()
        };
        let mut field_validators = BTreeMap::new();
        for (field, specs) in &policy.validators {
            field_validators.insert(field.clone(), build_all(specs)?);
        }
        let default_validators = build_all(&policy.default_validators)?;

        let arbiter = Arbiter::new(policy.aggregation.clone())?;
        let quality = QualityAnalyzer::from_specs(&policy.quality_modules, policy.quality_penalties.clone())?;

        tracing::info!(
            retriever = %retriever.kind(),
            fields = field_validators.len(),
            strategy = policy.aggregation.strategy.as_str(),
            quality_modules = ?quality.module_names(),
            "checker ready"
        );

        Ok(Self {
            extractor,
            policy: policy.clone(),
            retriever,
            field_validators,
            default_validators,
            arbiter,
            quality,
            models,
            cache,
        })
    }

    pub fn schema(&self) -> &ExtractionSchema {
        self.extractor.schema()
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Verify a record against `document`.
    pub fn verify(&self, document: &str, fields: &BTreeMap<String, String>) -> VerificationReport {
        let claims = self.extract(fields);
        let index = self.index_for(document);
        let dispositions = claims
            .iter()
            .map(|claim| self.verify_claim(&index, document, fields, claim))
            .collect();
        self.assemble(dispositions, fields)
    }

    pub fn extract(&self, fields: &BTreeMap<String, String>) -> Vec<Claim> {
        let claims = self.extractor.extract(fields);
        claims.iter().for_each(|c| enter(c, ClaimStage::Extracted));
        claims
    }

    /// Retriever index for `document`, from the shared cache.
    pub fn index_for(&self, document: &str) -> RetrieverIndex {
        self.cache
            .get_or_build_with(document, &self.retriever, &self.models.embedder)
    }

    /// Run one claim through every stage after extraction.
    pub fn verify_claim(
        &self,
        index: &RetrieverIndex,
        document: &str,
        fields: &BTreeMap<String, String>,
        claim: &Claim,
    ) -> Disposition {
        let evidence = self.retrieve(index, claim, fields);
        let results = self.run_validators(claim, &evidence, document);
        self.resolve(claim, results, evidence, document)
    }

    pub fn retrieve(
        &self,
        index: &RetrieverIndex,
        claim: &Claim,
        fields: &BTreeMap<String, String>,
    ) -> Vec<EvidenceSpan> {
        let context = RetrievalContext {
            field: &claim.field,
            fields,
        };
        let context = self.policy.settings.include_field_context.then_some(&context);
        let evidence = index.retrieve(&claim.text, self.policy.settings.max_evidence_spans, context);
        enter(claim, ClaimStage::EvidenceRetrieved);
        evidence
    }

    /// Validators configured for `field`, falling back to the defaults.
    pub fn validators_for(&self, field: &str) -> &[ConfiguredValidator] {
        self.field_validators
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_validators)
    }

    /// Every validator for the claim's field. Failures become failed
    /// results and never abort the claim.
    pub fn run_validators(
        &self,
        claim: &Claim,
        evidence: &[EvidenceSpan],
        document: &str,
    ) -> Vec<ValidatorResult> {
        self.validators_for(&claim.field)
            .iter()
            .map(|validator| {
                let result = match validator.validate(claim, evidence, document) {
                    Ok(result) => result,
                    Err(err) => {
                        tracing::warn!(
                            claim = %claim.id,
                            validator = validator.name(),
                            error = %err,
                            "validator failed"
                        );
                        ValidatorResult::failed(validator.name(), err.to_string())
                    }
                };
                enter(claim, ClaimStage::Validated);
                result
            })
            .collect()
    }

    /// Arbitrate the results and attach quality analysis.
    pub fn resolve(
        &self,
        claim: &Claim,
        results: Vec<ValidatorResult>,
        evidence: Vec<EvidenceSpan>,
        document: &str,
    ) -> Disposition {
        let disposition = self.arbiter.arbitrate(claim, results, evidence);
        enter(claim, ClaimStage::Arbitrated);
        let disposition = self.quality.apply(disposition, document);
        enter(claim, ClaimStage::QualityScored);
        enter(claim, ClaimStage::Final);
        disposition
    }

    /// Roll dispositions up into a report.
    pub fn assemble(&self, dispositions: Vec<Disposition>, fields: &BTreeMap<String, String>) -> VerificationReport {
        let report = VerificationReport::assemble(dispositions, fields, self.schema(), &self.policy.scoring);
        tracing::debug!(
            claims = report.counts.total(),
            overall_score = report.overall_score,
            quality_score = report.quality_score,
            "report assembled"
        );
        report
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checker")
            .field("retriever", &self.retriever)
            .field("fields", &self.field_validators.keys().collect::<Vec<_>>())
            .field("arbiter", &self.arbiter)
            .field("quality", &self.quality)
            .finish()
    }
}

/// Verify with a throwaway checker and cache.
pub fn verify(
    document: &str,
    fields: &BTreeMap<String, String>,
    schema: &ExtractionSchema,
    policy: &PolicyConfig,
) -> Result<VerificationReport, ConfigError> {
    let checker = Checker::new(schema, policy, Arc::new(RetrieverCache::default()))?;
    Ok(checker.verify(document, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldSpec, QualityModuleSpec, ValidatorSpec};
    use crate::types::{ExtractionMethod, Verdict};

    fn schema() -> ExtractionSchema {
        ExtractionSchema::new("1.0")
            .field("symptoms", FieldSpec::new(ExtractionMethod::SentenceSplit))
            .field("alerts", FieldSpec::new(ExtractionMethod::Skip))
    }

    fn policy() -> PolicyConfig {
        PolicyConfig::new("1.0").field_validators("symptoms", vec![ValidatorSpec::named("nli")])
    }

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn checker(policy: &PolicyConfig) -> Checker {
        Checker::new(&schema(), policy, Arc::new(RetrieverCache::default())).unwrap()
    }

    #[test]
    fn test_unknown_names_fail_at_construction() {
        let cache = || Arc::new(RetrieverCache::default());

        let bad_validator = PolicyConfig::new("1.0").field_validators("symptoms", vec![ValidatorSpec::named("oracle")]);
        assert!(matches!(
            Checker::new(&schema(), &bad_validator, cache()),
            Err(ConfigError::UnknownValidator(_))
        ));

        let mut bad_retriever = policy();
        bad_retriever.retriever = "grep".to_string();
        assert!(matches!(
            Checker::new(&schema(), &bad_retriever, cache()),
            Err(ConfigError::UnknownRetriever(_))
        ));

        let mut bad_module = policy();
        bad_module.quality_modules.push(QualityModuleSpec::named("vibes"));
        assert!(matches!(
            Checker::new(&schema(), &bad_module, cache()),
            Err(ConfigError::UnknownQualityModule(_))
        ));
    }

    #[test]
    fn test_contradicted_claim_is_refuted() {
        let report = checker(&policy()).verify(
            "Patient denies chest pain. No fever noted.",
            &fields(&[("symptoms", "Patient has fever")]),
        );
        assert_eq!(report.dispositions.len(), 1);
        assert_eq!(report.dispositions[0].verdict, Verdict::Refuted);
        assert_eq!(report.overall_score, 0.0);
    }

    #[test]
    fn test_unrelated_claim_has_no_evidence() {
        let report = checker(&policy()).verify(
            "Patient denies chest pain. No fever noted.",
            &fields(&[("symptoms", "Quarterly revenue grew")]),
        );
        let d = &report.dispositions[0];
        assert!(d.evidence.is_empty());
        assert_eq!(d.verdict, Verdict::InsufficientEvidence);
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn test_order_and_default_validators() {
        let schema = ExtractionSchema::new("1.0")
            .field("a_history", FieldSpec::new(ExtractionMethod::SingleValue))
            .field("b_symptoms", FieldSpec::new(ExtractionMethod::SentenceSplit));
        let mut policy = PolicyConfig::new("1.0");
        policy.default_validators.push(ValidatorSpec::named("always_supported"));
        let checker = Checker::new(&schema, &policy, Arc::new(RetrieverCache::default())).unwrap();

        let report = checker.verify(
            "Cough for two weeks. Fever since Monday. History of asthma.",
            &fields(&[
                ("b_symptoms", "Cough for two weeks. Fever since Monday."),
                ("a_history", "History of asthma"),
            ]),
        );
        let ids: Vec<&str> = report.dispositions.iter().map(|d| d.claim.id.as_str()).collect();
        assert_eq!(ids, vec!["a_history#0", "b_symptoms#0", "b_symptoms#1"]);
        assert!(report.dispositions.iter().all(|d| d.verdict == Verdict::Supported));
        assert_eq!(report.overall_score, 1.0);
    }

    #[test]
    fn test_field_without_validators_is_insufficient() {
        let report = checker(&PolicyConfig::new("1.0")).verify("Cough.", &fields(&[("symptoms", "Cough")]));
        assert_eq!(report.dispositions[0].verdict, Verdict::InsufficientEvidence);
    }

    #[test]
    fn test_cache_reused_across_calls() {
        let checker = checker(&policy());
        let doc = "Patient denies chest pain. No fever noted.";
        checker.verify(doc, &fields(&[("symptoms", "Patient has fever")]));
        checker.verify(doc, &fields(&[("symptoms", "Patient denies chest pain")]));
        let stats = checker.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.builds), (1, 1, 1));

        checker.clear_cache();
        assert_eq!(checker.cache_stats().size, 0);
    }

    #[test]
    fn test_free_function() {
        let report = verify(
            "Patient denies chest pain. No fever noted.",
            &fields(&[("symptoms", "Patient denies chest pain")]),
            &schema(),
            &policy(),
        )
        .unwrap();
        assert_eq!(report.dispositions[0].verdict, Verdict::Supported);
    }

    #[test]
    fn test_checker_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Checker>();
    }
}
