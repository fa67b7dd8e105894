//! Diagnostic validator that supports every claim with evidence.

use super::{Assessment, Validator, ValidatorError};
use crate::evidence::EvidenceSpan;
use crate::types::Claim;

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSupported;

impl Validator for AlwaysSupported {
    fn name(&self) -> &str {
        "always_supported"
    }

    fn assess(&self, _: &Claim, evidence: &[EvidenceSpan], _: &str) -> Result<Assessment, ValidatorError> {
        Ok(Assessment::entailment(
            1.0,
            format!("Accepted unconditionally ({} span(s) retrieved)", evidence.len()),
        ))
    }
}
