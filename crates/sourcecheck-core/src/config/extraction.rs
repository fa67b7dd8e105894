//! Extraction schema parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::ConfigError;
use crate::types::ExtractionMethod;

/// How much a field matters to the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

/// Per-criticality weights for `criticality_weighted` scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct CriticalityWeights {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for CriticalityWeights {
    fn default() -> Self {
        Self {
            critical: 1.0,
            high: 0.75,
            medium: 0.5,
            low: 0.25,
        }
    }
}

impl CriticalityWeights {
    pub fn weight(&self, criticality: Criticality) -> f64 {
        match criticality {
            Criticality::Critical => self.critical,
            Criticality::High => self.high,
            Criticality::Medium => self.medium,
            Criticality::Low => self.low,
        }
    }
}

/// Extraction settings for one field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    #[serde(default)]
    pub method: ExtractionMethod,

    /// `pipe`, `comma`, `semicolon`, `newline`, `tab`, or a literal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,

    /// Regex with named capture groups, for `structured`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default = "default_trim")]
    pub trim: bool,

    /// Method to try when the primary one finds nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ExtractionMethod>,

    #[serde(default)]
    pub criticality: Criticality,

    /// Whether the field must be present and non-empty
    #[serde(default)]
    pub required: bool,

    /// Segments shorter than this many characters are dropped
    #[serde(default = "default_min_claim_length")]
    pub min_claim_length: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_trim() -> bool {
    true
}

fn default_min_claim_length() -> usize {
    1
}

impl FieldSpec {
    pub fn new(method: ExtractionMethod) -> Self {
        Self {
            method,
            delimiter: None,
            pattern: None,
            trim: true,
            fallback: None,
            criticality: Criticality::default(),
            required: false,
            min_claim_length: 1,
            description: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_fallback(mut self, fallback: ExtractionMethod) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Delimiter resolved from its symbolic name.
    pub fn resolved_delimiter(&self) -> Option<String> {
        self.delimiter.as_deref().map(|d| {
            match d {
                "pipe" => "|",
                "comma" => ",",
                "semicolon" => ";",
                "newline" => "\n",
                "tab" => "\t",
                literal => literal,
            }
            .to_string()
        })
    }
}

/// Describes which fields exist and how each becomes claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExtractionSchema {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Fields in deterministic (sorted) order
    pub fields: BTreeMap<String, FieldSpec>,

    #[serde(default)]
    pub criticality_weights: CriticalityWeights,
}

impl ExtractionSchema {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            name: None,
            fields: BTreeMap::new(),
            criticality_weights: CriticalityWeights::default(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let schema: ExtractionSchema = serde_yaml::from_str(yaml)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let schema: ExtractionSchema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Structural checks that serde cannot express.
    ///
    /// Regex compilation happens in the extractor, which owns the
    /// compiled patterns.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::MissingField("version".to_string()));
        }
        if self.fields.is_empty() {
            return Err(ConfigError::MissingField("fields".to_string()));
        }

        for (name, spec) in &self.fields {
            let uses = |m: ExtractionMethod| spec.method == m || spec.fallback == Some(m);

            if uses(ExtractionMethod::Delimited) && spec.delimiter.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingField(format!("fields.{}.delimiter", name)));
            }
            if uses(ExtractionMethod::Structured) && spec.pattern.is_none() {
                return Err(ConfigError::MissingField(format!("fields.{}.pattern", name)));
            }
            if spec.fallback == Some(ExtractionMethod::Skip) {
                return Err(ConfigError::invalid(
                    format!("fields.{}.fallback", name),
                    "skip cannot be used as a fallback",
                ));
            }
        }

        let w = &self.criticality_weights;
        for (key, value) in [("critical", w.critical), ("high", w.high), ("medium", w.medium), ("low", w.low)] {
            if !(value >= 0.0) {
                return Err(ConfigError::invalid(
                    format!("criticality_weights.{}", key),
                    "weight must be non-negative",
                ));
            }
        }

        Ok(())
    }

    /// Fields whose extraction method produces claims.
    pub fn verifiable_fields(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.fields
            .iter()
            .filter(|(_, spec)| spec.method != ExtractionMethod::Skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
version: "1.0"
fields:
  symptoms:
    method: bullet_list
    fallback: sentence_split
    criticality: high
    required: true
  medications:
    method: delimited
    delimiter: comma
  alerts:
    method: skip
"#;

    #[test]
    fn test_parse_schema() {
        let schema = ExtractionSchema::from_yaml(SCHEMA).unwrap();
        assert_eq!(schema.fields.len(), 3);
        let symptoms = &schema.fields["symptoms"];
        assert_eq!(symptoms.method, ExtractionMethod::BulletList);
        assert_eq!(symptoms.fallback, Some(ExtractionMethod::SentenceSplit));
        assert_eq!(symptoms.criticality, Criticality::High);
        assert!(symptoms.trim);
        assert_eq!(schema.fields["medications"].resolved_delimiter().as_deref(), Some(","));
        assert_eq!(schema.criticality_weights.weight(Criticality::High), 0.75);
    }

    #[test]
    fn test_unknown_field_key_rejected() {
        let yaml = r#"
version: "1.0"
fields:
  summary:
    method: single_value
    delimeter: comma
"#;
        assert!(matches!(ExtractionSchema::from_yaml(yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_delimited_requires_delimiter() {
        let yaml = r#"
version: "1.0"
fields:
  meds:
    method: delimited
"#;
        assert!(matches!(
            ExtractionSchema::from_yaml(yaml),
            Err(ConfigError::MissingField(f)) if f == "fields.meds.delimiter"
        ));
    }

    #[test]
    fn test_missing_version() {
        let yaml = r#"
version: ""
fields:
  summary: {}
"#;
        assert!(matches!(
            ExtractionSchema::from_yaml(yaml),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_literal_delimiter_passes_through() {
        let spec = FieldSpec::new(ExtractionMethod::Delimited).with_delimiter(" / ");
        assert_eq!(spec.resolved_delimiter().as_deref(), Some(" / "));
    }
}
