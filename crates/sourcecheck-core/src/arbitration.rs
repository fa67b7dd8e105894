//! Arbitration: combines validator results into one disposition per claim.
//!
//! The order of decisions is fixed:
//! 1. Failed results are set aside; no usable result means
//!    `insufficient_evidence`
//! 2. A single usable result passes through unchanged
//! 3. When verdicts conflict, conflict rules run in declared order and the
//!    first match decides
//! 4. Otherwise the configured strategy decides
//!
//! Every path ends in exactly one of the three verdicts.

use std::collections::{BTreeMap, HashMap};

use crate::config::{AggregationConfig, ConfigError, ConflictRule, RuleAction, RuleCondition, Strategy};
use crate::evidence::EvidenceSpan;
use crate::text::jaccard_overlap;
use crate::types::{Claim, ConflictHint, Disposition, ValidatorResult, Verdict};
use crate::validators::canonical_name;

/// Agreement multiplier applied when a refutation was overruled.
const OVERRIDDEN_REFUTATION_FACTOR: f64 = 0.9;

/// One usable result as it takes part in voting.
#[derive(Debug, Clone)]
struct Vote<'a> {
    result: &'a ValidatorResult,
    verdict: Verdict,
}

/// The outcome of rules or strategy, before confidence and agreement.
#[derive(Debug)]
struct Decision {
    verdict: Verdict,
    explanation: String,
    resolved_by: Option<String>,
    /// Confidence to use when no result agrees with the verdict
    fallback_confidence: f64,
}

/// The arbitration engine.
#[derive(Debug, Clone)]
pub struct Arbiter {
    config: AggregationConfig,
    priority: Vec<Verdict>,
    weights: HashMap<String, f64>,
    rules: Vec<ConflictRule>,
}

impl Arbiter {
    pub fn new(config: AggregationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let weights = config
            .default_weights
            .iter()
            .map(|(name, w)| (canonical(name), *w))
            .collect();
        let rules = config
            .conflict_resolution
            .iter()
            .cloned()
            .map(|mut rule| {
                rule.validators = rule.validators.iter().map(|n| canonical(n)).collect();
                rule
            })
            .collect();

        Ok(Self {
            priority: config.full_priority(),
            weights,
            rules,
            config,
        })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Resolve one claim.
    pub fn arbitrate(
        &self,
        claim: &Claim,
        results: Vec<ValidatorResult>,
        evidence: Vec<EvidenceSpan>,
    ) -> Disposition {
        let mut votes: Vec<Vote<'_>> = results
            .iter()
            .filter(|r| r.is_usable())
            .map(|r| Vote {
                result: r,
                verdict: r.verdict,
            })
            .collect();
        // A lone result passes through untouched; the threshold only weighs votes.
        if votes.len() > 1 {
            for vote in &mut votes {
                if vote.result.confidence < self.config.min_confidence {
                    vote.verdict = Verdict::InsufficientEvidence;
                }
            }
        }

        let (decision, agreeing, agreement) = match votes.len() {
            0 => {
                let explanation = if results.is_empty() {
                    "No validators configured for this claim".to_string()
                } else {
                    format!("All {} validator(s) failed", results.len())
                };
                let decision = Decision {
                    verdict: Verdict::InsufficientEvidence,
                    explanation,
                    resolved_by: None,
                    fallback_confidence: 0.0,
                };
                (decision, Vec::new(), 0.0)
            }
            1 => {
                let vote = &votes[0];
                let decision = Decision {
                    verdict: vote.verdict,
                    explanation: vote.result.explanation.clone(),
                    resolved_by: None,
                    fallback_confidence: 0.0,
                };
                (decision, vec![vote.clone()], 1.0)
            }
            _ => {
                let decision = self.decide(claim, &votes, &evidence);
                let agreeing: Vec<Vote<'_>> = votes
                    .iter()
                    .filter(|v| v.verdict == decision.verdict)
                    .cloned()
                    .collect();
                let mut agreement = agreeing.len() as f64 / votes.len() as f64;
                if decision.verdict != Verdict::Refuted && votes.iter().any(|v| v.verdict == Verdict::Refuted) {
                    agreement *= OVERRIDDEN_REFUTATION_FACTOR;
                }
                (decision, agreeing, agreement)
            }
        };

        let confidence = if agreeing.is_empty() {
            decision.fallback_confidence
        } else {
            agreeing.iter().map(|v| v.result.confidence).sum::<f64>() / agreeing.len() as f64
        };
        let validators = if agreeing.is_empty() {
            votes.iter().map(|v| v.result.validator.clone()).collect()
        } else {
            agreeing.iter().map(|v| v.result.validator.clone()).collect()
        };

        tracing::debug!(
            claim = %claim.id,
            verdict = %decision.verdict,
            strategy = self.config.strategy.as_str(),
            resolved_by = decision.resolved_by.as_deref().unwrap_or("-"),
            usable = votes.len(),
            total = results.len(),
            "arbitrated claim"
        );

        let keep_results = self.config.explain_conflicts || results.iter().any(|r| !r.is_usable());
        Disposition {
            claim: claim.clone(),
            verdict: decision.verdict,
            confidence: confidence.clamp(0.0, 1.0),
            evidence,
            validators,
            explanation: decision.explanation,
            validator_results: keep_results.then_some(results),
            agreement,
            resolved_by: decision.resolved_by,
            quality_score: 1.0,
            quality_issues: Vec::new(),
        }
    }

    fn decide(&self, claim: &Claim, votes: &[Vote<'_>], evidence: &[EvidenceSpan]) -> Decision {
        let conflict = votes.iter().any(|v| v.verdict != votes[0].verdict);
        if conflict {
            for rule in &self.rules {
                if let Some(decision) = self.apply_rule(rule, claim, votes, evidence) {
                    return decision;
                }
            }
        }

        let (verdict, explanation) = match self.config.strategy {
            Strategy::WeightedVoting => self.weighted(votes),
            Strategy::Unanimous => {
                if conflict {
                    (
                        Verdict::InsufficientEvidence,
                        format!("unanimous: validators disagree ({})", describe(votes)),
                    )
                } else {
                    (votes[0].verdict, format!("unanimous: all {} validators agree", votes.len()))
                }
            }
            Strategy::Majority => self.majority(votes),
            Strategy::FirstWins => match votes.iter().find(|v| v.verdict != Verdict::InsufficientEvidence) {
                Some(v) => (
                    v.verdict,
                    format!("first_wins: {} decided", v.result.validator),
                ),
                None => (
                    Verdict::InsufficientEvidence,
                    "first_wins: no validator reached a verdict".to_string(),
                ),
            },
            Strategy::Priority => {
                let verdict = self.by_priority(votes.iter().map(|v| v.verdict));
                (verdict, format!("priority: {} ({})", verdict, describe(votes)))
            }
        };

        Decision {
            verdict,
            explanation,
            resolved_by: None,
            fallback_confidence: 0.0,
        }
    }

    fn apply_rule(
        &self,
        rule: &ConflictRule,
        claim: &Claim,
        votes: &[Vote<'_>],
        evidence: &[EvidenceSpan],
    ) -> Option<Decision> {
        let listed: Vec<&Vote<'_>> = rule
            .validators
            .iter()
            .filter_map(|name| votes.iter().find(|v| &v.result.validator == name))
            .collect();

        let matched = match rule.condition {
            RuleCondition::RefutedVsSupported => {
                listed.len() >= 2
                    && listed[0].result.validator == rule.validators[0]
                    && listed[1].result.validator == rule.validators[1]
                    && listed[0].verdict == Verdict::Refuted
                    && listed[1].verdict == Verdict::Supported
            }
            RuleCondition::Disagreement => {
                listed.len() == rule.validators.len() && listed.iter().any(|v| v.verdict != listed[0].verdict)
            }
        };
        if !matched {
            return None;
        }

        let label = rule.label();
        let conflict = listed
            .iter()
            .map(|v| format!("{}={}", v.result.validator, v.verdict))
            .collect::<Vec<_>>()
            .join(" vs ");

        let decision = match rule.action {
            RuleAction::CheckLexicalOverlap => {
                let overlap = evidence
                    .first()
                    .map(|top| jaccard_overlap(&claim.text, &top.text))
                    .unwrap_or(0.0);
                if overlap >= rule.threshold {
                    Decision {
                        verdict: rule.result_if_above,
                        explanation: format!(
                            "Conflict rule '{}' ({}): lexical overlap {:.2} >= {:.2}, accepting as {}",
                            label, conflict, overlap, rule.threshold, rule.result_if_above
                        ),
                        resolved_by: Some(label),
                        fallback_confidence: overlap,
                    }
                } else {
                    let verdict = rule.result_if_below.unwrap_or_else(|| {
                        if listed.iter().any(|v| v.verdict == Verdict::Refuted) {
                            Verdict::Refuted
                        } else {
                            Verdict::InsufficientEvidence
                        }
                    });
                    Decision {
                        verdict,
                        explanation: format!(
                            "Conflict rule '{}' ({}): lexical overlap {:.2} < {:.2}, accepting as {}",
                            label, conflict, overlap, rule.threshold, verdict
                        ),
                        resolved_by: Some(label),
                        fallback_confidence: 1.0 - overlap,
                    }
                }
            }
            RuleAction::SetVerdict => {
                let verdict = rule.verdict.unwrap_or(Verdict::InsufficientEvidence);
                Decision {
                    verdict,
                    explanation: format!("Conflict rule '{}' ({}): set to {}", label, conflict, verdict),
                    resolved_by: Some(label),
                    fallback_confidence: 0.0,
                }
            }
        };
        Some(decision)
    }

    fn weight_of(&self, result: &ValidatorResult) -> f64 {
        result
            .weight
            .or_else(|| self.weights.get(&result.validator).copied())
            .unwrap_or(1.0)
    }

    fn weighted(&self, votes: &[Vote<'_>]) -> (Verdict, String) {
        let mut totals: BTreeMap<Verdict, f64> = BTreeMap::new();
        for vote in votes {
            *totals.entry(vote.verdict).or_insert(0.0) += self.weight_of(vote.result);
        }
        let best = totals.values().cloned().fold(f64::NEG_INFINITY, f64::max);
        let tied: Vec<Verdict> = totals
            .iter()
            .filter(|(_, w)| (**w - best).abs() < 1e-9)
            .map(|(v, _)| *v)
            .collect();

        let verdict = if tied.len() == 1 {
            tied[0]
        } else {
            self.break_tie_by_hints(votes, &tied)
                .unwrap_or_else(|| self.by_priority(tied.iter().copied()))
        };

        let tally = self
            .priority
            .iter()
            .filter_map(|v| totals.get(v).map(|w| format!("{} {:.2}", v, w)))
            .collect::<Vec<_>>()
            .join(", ");
        let tie_note = if tied.len() > 1 { ", tie broken" } else { "" };
        (verdict, format!("weighted_voting: {} ({}{})", verdict, tally, tie_note))
    }

    /// A tied verdict favoured by more `on_conflict` hints than any other.
    fn break_tie_by_hints(&self, votes: &[Vote<'_>], tied: &[Verdict]) -> Option<Verdict> {
        let mut support = 0usize;
        let mut refute = 0usize;
        for vote in votes {
            match vote.result.on_conflict {
                ConflictHint::PreferSupport => support += 1,
                ConflictHint::PreferRefute => refute += 1,
                ConflictHint::Neutral => {}
            }
        }
        let preferred = match support.cmp(&refute) {
            std::cmp::Ordering::Greater => Verdict::Supported,
            std::cmp::Ordering::Less => Verdict::Refuted,
            std::cmp::Ordering::Equal => return None,
        };
        tied.contains(&preferred).then_some(preferred)
    }

    fn majority(&self, votes: &[Vote<'_>]) -> (Verdict, String) {
        let mut counts: BTreeMap<Verdict, usize> = BTreeMap::new();
        for vote in votes {
            *counts.entry(vote.verdict).or_insert(0) += 1;
        }
        if let Some((verdict, count)) = counts.iter().find(|(_, c)| **c * 2 > votes.len()) {
            return (
                *verdict,
                format!("majority: {} of {} validators say {}", count, votes.len(), verdict),
            );
        }
        let verdict = self.by_priority(votes.iter().map(|v| v.verdict));
        (verdict, format!("majority: no strict majority, priority chose {}", verdict))
    }

    fn by_priority(&self, present: impl Iterator<Item = Verdict>) -> Verdict {
        let present: Vec<Verdict> = present.collect();
        self.priority
            .iter()
            .copied()
            .find(|v| present.contains(v))
            .unwrap_or(Verdict::InsufficientEvidence)
    }
}

fn canonical(name: &str) -> String {
    canonical_name(name).map(str::to_string).unwrap_or_else(|| name.to_string())
}

fn describe(votes: &[Vote<'_>]) -> String {
    votes
        .iter()
        .map(|v| format!("{}={}", v.result.validator, v.verdict))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strategy;
    use proptest::prelude::*;

    fn claim(text: &str) -> Claim {
        Claim::new("symptoms", 0, text)
    }

    fn result(name: &str, verdict: Verdict, confidence: f64) -> ValidatorResult {
        ValidatorResult::new(name, verdict, confidence, format!("{} says {}", name, verdict))
    }

    fn arbiter(config: AggregationConfig) -> Arbiter {
        Arbiter::new(config).unwrap()
    }

    fn weighted() -> AggregationConfig {
        AggregationConfig {
            strategy: Strategy::WeightedVoting,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_result_passes_through() {
        let r = result("nli", Verdict::Supported, 0.8);
        let d = arbiter(AggregationConfig::default()).arbitrate(&claim("x"), vec![r.clone()], vec![]);
        assert_eq!(d.verdict, Verdict::Supported);
        assert_eq!(d.confidence, 0.8);
        assert_eq!(d.explanation, r.explanation);
        assert_eq!(d.validators, vec!["nli"]);
        assert_eq!(d.agreement, 1.0);
    }

    #[test]
    fn test_no_results_is_insufficient() {
        let d = arbiter(AggregationConfig::default()).arbitrate(&claim("x"), vec![], vec![]);
        assert_eq!(d.verdict, Verdict::InsufficientEvidence);
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn test_failed_results_do_not_vote_but_are_kept() {
        let results = vec![
            ValidatorResult::failed("nli", "model offline"),
            result("lexical_coverage", Verdict::Supported, 0.7),
        ];
        let d = arbiter(AggregationConfig::default()).arbitrate(&claim("x"), results, vec![]);
        assert_eq!(d.verdict, Verdict::Supported);
        assert_eq!(d.validator_results.as_ref().map(Vec::len), Some(2));

        let all_failed = vec![ValidatorResult::failed("nli", "model offline")];
        let d = arbiter(AggregationConfig::default()).arbitrate(&claim("x"), all_failed, vec![]);
        assert_eq!(d.verdict, Verdict::InsufficientEvidence);
    }

    #[test]
    fn test_weighted_voting_heavier_side_wins() {
        let results = vec![
            result("a", Verdict::Supported, 0.9).with_weight(0.4),
            result("b", Verdict::Refuted, 0.7).with_weight(0.6),
        ];
        let d = arbiter(weighted()).arbitrate(&claim("x"), results, vec![]);
        assert_eq!(d.verdict, Verdict::Refuted);
        assert_eq!(d.validators, vec!["b"]);
        assert!((d.confidence - 0.7).abs() < 1e-9);
        assert!((d.agreement - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_weight_precedence() {
        let mut config = weighted();
        config.default_weights.insert("a".to_string(), 3.0);
        let results = vec![
            result("a", Verdict::Supported, 0.9),
            result("b", Verdict::Refuted, 0.7).with_weight(2.0),
        ];
        let d = arbiter(config).arbitrate(&claim("x"), results, vec![]);
        assert_eq!(d.verdict, Verdict::Supported);
    }

    #[test]
    fn test_weighted_tie_uses_priority() {
        let results = || {
            vec![
                result("a", Verdict::Supported, 0.9),
                result("b", Verdict::Refuted, 0.9),
            ]
        };
        let d = arbiter(weighted()).arbitrate(&claim("x"), results(), vec![]);
        assert_eq!(d.verdict, Verdict::Refuted);

        let config = AggregationConfig {
            verdict_priority: vec![Verdict::Supported, Verdict::Refuted],
            ..weighted()
        };
        let d = arbiter(config).arbitrate(&claim("x"), results(), vec![]);
        assert_eq!(d.verdict, Verdict::Supported);
    }

    #[test]
    fn test_weighted_tie_uses_hints_before_priority() {
        let results = vec![
            result("a", Verdict::Supported, 0.9).with_hint(ConflictHint::PreferSupport),
            result("b", Verdict::Refuted, 0.9),
        ];
        let d = arbiter(weighted()).arbitrate(&claim("x"), results, vec![]);
        assert_eq!(d.verdict, Verdict::Supported);
        // refutation overridden
        assert!((d.agreement - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_lexical_overlap_rule_above_threshold() {
        let config = AggregationConfig {
            conflict_resolution: vec![ConflictRule {
                name: None,
                condition: RuleCondition::RefutedVsSupported,
                validators: vec!["nli_validator".to_string(), "hybrid".to_string()],
                action: RuleAction::CheckLexicalOverlap,
                threshold: 0.6,
                result_if_above: Verdict::Supported,
                result_if_below: None,
                verdict: None,
            }],
            ..Default::default()
        };
        let doc = "Patient denies fever today";
        let evidence = vec![EvidenceSpan::from_document(doc, 0, doc.len(), 0.5, "bm25")];
        let results = vec![
            result("nli", Verdict::Refuted, 0.95),
            result("hybrid", Verdict::Supported, 0.6),
        ];
        let d = arbiter(config).arbitrate(&claim("Patient denies fever"), results, evidence);
        assert_eq!(d.verdict, Verdict::Supported);
        assert!(d.explanation.contains("0.75"));
        assert_eq!(d.resolved_by.as_deref(), Some("refuted_vs_supported(nli,hybrid)"));
        assert_eq!(d.validators, vec!["hybrid"]);
    }

    #[test]
    fn test_lexical_overlap_rule_below_threshold_defaults_to_refuted() {
        let config = AggregationConfig {
            strategy: Strategy::WeightedVoting,
            conflict_resolution: vec![ConflictRule {
                name: Some("overlap".to_string()),
                condition: RuleCondition::Disagreement,
                validators: vec!["nli".to_string(), "hybrid".to_string()],
                action: RuleAction::CheckLexicalOverlap,
                threshold: 0.6,
                result_if_above: Verdict::Supported,
                result_if_below: None,
                verdict: None,
            }],
            ..Default::default()
        };
        let results = vec![
            result("nli", Verdict::Refuted, 0.95),
            result("hybrid", Verdict::Supported, 0.6).with_weight(5.0),
        ];
        let d = arbiter(config).arbitrate(&claim("Patient denies fever"), results, vec![]);
        assert_eq!(d.verdict, Verdict::Refuted);
        assert_eq!(d.resolved_by.as_deref(), Some("overlap"));
    }

    #[test]
    fn test_rule_needs_listed_validators() {
        let config = AggregationConfig {
            conflict_resolution: vec![ConflictRule {
                name: None,
                condition: RuleCondition::Disagreement,
                validators: vec!["nli".to_string(), "pattern".to_string()],
                action: RuleAction::SetVerdict,
                threshold: 0.5,
                result_if_above: Verdict::Supported,
                result_if_below: None,
                verdict: Some(Verdict::Supported),
            }],
            ..Default::default()
        };
        let results = vec![
            result("nli", Verdict::Refuted, 0.95),
            result("hybrid", Verdict::Supported, 0.6),
        ];
        let d = arbiter(config).arbitrate(&claim("x"), results, vec![]);
        // falls through to priority
        assert_eq!(d.verdict, Verdict::Refuted);
        assert!(d.resolved_by.is_none());
    }

    #[test]
    fn test_strategies() {
        let results = || {
            vec![
                result("a", Verdict::InsufficientEvidence, 0.2),
                result("b", Verdict::Supported, 0.8),
                result("c", Verdict::Supported, 0.6),
                result("d", Verdict::Refuted, 0.9),
            ]
        };
        let run = |strategy| {
            arbiter(AggregationConfig {
                strategy,
                ..Default::default()
            })
            .arbitrate(&claim("x"), results(), vec![])
            .verdict
        };
        assert_eq!(run(Strategy::Unanimous), Verdict::InsufficientEvidence);
        assert_eq!(run(Strategy::Majority), Verdict::Refuted);
        assert_eq!(run(Strategy::FirstWins), Verdict::Supported);
        assert_eq!(run(Strategy::Priority), Verdict::Refuted);
        assert_eq!(run(Strategy::WeightedVoting), Verdict::Supported);
    }

    #[test]
    fn test_strict_majority() {
        let results = vec![
            result("a", Verdict::Supported, 0.8),
            result("b", Verdict::Supported, 0.6),
            result("c", Verdict::Refuted, 0.9),
        ];
        let d = arbiter(AggregationConfig {
            strategy: Strategy::Majority,
            ..Default::default()
        })
        .arbitrate(&claim("x"), results, vec![]);
        assert_eq!(d.verdict, Verdict::Supported);
        assert!((d.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_min_confidence_downgrades() {
        let config = AggregationConfig {
            min_confidence: 0.5,
            ..Default::default()
        };
        let results = vec![
            result("a", Verdict::Refuted, 0.3),
            result("b", Verdict::Supported, 0.8),
        ];
        let d = arbiter(config).arbitrate(&claim("x"), results, vec![]);
        assert_eq!(d.verdict, Verdict::Supported);
    }

    #[test]
    fn test_min_confidence_ignores_single_result() {
        let config = AggregationConfig {
            min_confidence: 0.5,
            ..Default::default()
        };
        let r = result("nli", Verdict::Refuted, 0.3);
        let d = arbiter(config).arbitrate(&claim("x"), vec![r.clone()], vec![]);
        assert_eq!(d.verdict, Verdict::Refuted);
        assert!((d.confidence - 0.3).abs() < 1e-9);
        assert_eq!(d.explanation, r.explanation);
    }

    #[test]
    fn test_explain_conflicts_attaches_results() {
        let config = AggregationConfig {
            explain_conflicts: true,
            ..Default::default()
        };
        let results = vec![
            result("a", Verdict::Supported, 0.8),
            result("b", Verdict::Supported, 0.6),
        ];
        let d = arbiter(config).arbitrate(&claim("x"), results, vec![]);
        assert_eq!(d.validator_results.map(|r| r.len()), Some(2));

        let d = arbiter(AggregationConfig::default()).arbitrate(
            &claim("x"),
            vec![result("a", Verdict::Supported, 0.8), result("b", Verdict::Supported, 0.6)],
            vec![],
        );
        assert!(d.validator_results.is_none());
    }

    fn verdict_strategy() -> impl proptest::strategy::Strategy<Value = Verdict> {
        prop_oneof![
            Just(Verdict::Supported),
            Just(Verdict::Refuted),
            Just(Verdict::InsufficientEvidence),
        ]
    }

    proptest! {
        #[test]
        fn prop_arbitration_is_bounded_and_total(
            votes in proptest::collection::vec((verdict_strategy(), 0.0f64..=1.0, proptest::option::of(0.0f64..3.0), any::<bool>()), 0..6),
            strategy in prop_oneof![
                Just(Strategy::WeightedVoting),
                Just(Strategy::Unanimous),
                Just(Strategy::Majority),
                Just(Strategy::FirstWins),
                Just(Strategy::Priority),
            ],
        ) {
            let results: Vec<ValidatorResult> = votes
                .iter()
                .enumerate()
                .map(|(i, (verdict, confidence, weight, failed))| {
                    if *failed {
                        ValidatorResult::failed(format!("v{}", i), "boom")
                    } else {
                        let r = result(&format!("v{}", i), *verdict, *confidence);
                        match weight {
                            Some(w) => r.with_weight(*w),
                            None => r,
                        }
                    }
                })
                .collect();
            let d = arbiter(AggregationConfig { strategy, ..Default::default() })
                .arbitrate(&claim("x"), results, vec![]);
            prop_assert!((0.0..=1.0).contains(&d.confidence));
            prop_assert!((0.0..=1.0).contains(&d.agreement));
            prop_assert!(Verdict::DEFAULT_PRIORITY.contains(&d.verdict));
        }

        #[test]
        fn prop_single_result_identity(verdict in verdict_strategy(), confidence in 0.0f64..=1.0) {
            let d = arbiter(AggregationConfig::default())
                .arbitrate(&claim("x"), vec![result("only", verdict, confidence)], vec![]);
            prop_assert_eq!(d.verdict, verdict);
            prop_assert!((d.confidence - confidence).abs() < 1e-12);
        }
    }
}
