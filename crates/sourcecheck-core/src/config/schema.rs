//! JSON Schema validation for policies.
//!
//! The schema is embedded at compile time from `schemas/policy.schema.json`
//! and compiled once on first use.

use std::sync::OnceLock;

const POLICY_SCHEMA_JSON: &str = include_str!("../../schemas/policy.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn compiled() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(POLICY_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;
        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });
    result.as_ref().map_err(Clone::clone)
}

/// Validate a policy document before typed deserialization.
///
/// Returns every structural error found, each with its instance path.
pub fn validate_policy_schema(policy: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = compiled().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(policy)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
