//! Fallback strategies when an agent call fails.

use serde::{Deserialize, Serialize};
use sourcecheck_core::ValidatorResult;

/// What to do with a vote an agent could not deliver (error, timeout,
/// open circuit or rejected evidence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Run the field's deterministic core validators instead
    #[default]
    Deterministic,

    /// Record a failed result; the claim is decided by the remaining votes
    Abstain,
}

impl FallbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackStrategy::Deterministic => "deterministic",
            FallbackStrategy::Abstain => "abstain",
        }
    }
}

/// Mark a deterministic result as standing in for an agent.
pub(crate) fn discount(mut result: ValidatorResult, factor: f64) -> ValidatorResult {
    result.confidence = (result.confidence * factor).clamp(0.0, 1.0);
    result.explanation = format!("[fallback] {}", result.explanation);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcecheck_core::Verdict;

    #[test]
    fn test_default_is_deterministic() {
        assert_eq!(FallbackStrategy::default(), FallbackStrategy::Deterministic);
        let parsed: FallbackStrategy = serde_yaml::from_str("abstain").unwrap();
        assert_eq!(parsed.as_str(), "abstain");
    }

    #[test]
    fn test_discount_scales_confidence() {
        let result = discount(ValidatorResult::new("nli", Verdict::Supported, 0.9, "entailed"), 0.8);
        assert!((result.confidence - 0.72).abs() < 1e-9);
        assert_eq!(result.verdict, Verdict::Supported);
        assert!(result.explanation.starts_with("[fallback]"));
    }
}
