//! Claim extraction: field values to atomic claims.
//!
//! Each schema field names a method. When the method's primary pattern is
//! absent (no delimiter, no bullets, no regex match) extraction degrades
//! to the field's fallback, then to `single_value`, and records the
//! degraded path on every claim it produces. A non-empty field therefore
//! always yields at least one claim unless its method is `skip`.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};

use crate::config::{ConfigError, ExtractionSchema, FieldSpec};
use crate::text::{sentence_spans, BULLET_PATTERN};
use crate::types::{Claim, ClaimMetadata, ExtractionMethod};

/// One extracted segment before it becomes a [`Claim`].
struct Segment {
    text: String,
    captures: BTreeMap<String, String>,
}

impl Segment {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            captures: BTreeMap::new(),
        }
    }
}

/// Compiled extraction schema.
#[derive(Debug, Clone)]
pub struct ClaimExtractor {
    schema: ExtractionSchema,
    patterns: HashMap<String, Regex>,
}

impl ClaimExtractor {
    /// Compile every `structured` pattern up front.
    pub fn new(schema: &ExtractionSchema) -> Result<Self, ConfigError> {
        schema.validate()?;

        let mut patterns = HashMap::new();
        for (name, spec) in &schema.fields {
            if let Some(pattern) = &spec.pattern {
                let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    field: name.clone(),
                    message: e.to_string(),
                })?;
                patterns.insert(name.clone(), regex);
            }
        }

        Ok(Self {
            schema: schema.clone(),
            patterns,
        })
    }

    pub fn schema(&self) -> &ExtractionSchema {
        &self.schema
    }

    /// Extract claims in schema field order, then segment order.
    ///
    /// Fields missing from the schema are ignored; empty values yield
    /// nothing.
    pub fn extract(&self, fields: &BTreeMap<String, String>) -> Vec<Claim> {
        let mut claims = Vec::new();
        for (name, spec) in &self.schema.fields {
            let Some(value) = fields.get(name) else {
                continue;
            };
            claims.extend(self.extract_field(name, spec, value));
        }
        claims
    }

    /// Extract the claims of a single field.
    pub fn extract_field(&self, name: &str, spec: &FieldSpec, value: &str) -> Vec<Claim> {
        if spec.method == ExtractionMethod::Skip || value.trim().is_empty() {
            return Vec::new();
        }

        let mut chain = vec![spec.method];
        if let Some(fallback) = spec.fallback {
            chain.push(fallback);
        }
        chain.push(ExtractionMethod::SingleValue);
        chain.dedup();

        for (attempt, method) in chain.iter().copied().enumerate() {
            let segments = self.apply(name, spec, method, value);
            if segments.is_empty() {
                tracing::debug!(field = name, method = %method, "extraction method found nothing");
                continue;
            }

            let degraded_from = (attempt > 0).then_some(spec.method);
            if let Some(from) = degraded_from {
                tracing::debug!(field = name, from = %from, to = %method, "extraction degraded");
            }

            return segments
                .into_iter()
                .enumerate()
                .map(|(index, segment)| Claim {
                    id: format!("{}#{}", name, index),
                    field: name.to_string(),
                    text: segment.text,
                    metadata: ClaimMetadata {
                        method,
                        requested_method: spec.method,
                        degraded_from,
                        delimiter: (method == ExtractionMethod::Delimited)
                            .then(|| spec.resolved_delimiter())
                            .flatten(),
                        pattern: (method == ExtractionMethod::Structured)
                            .then(|| spec.pattern.clone())
                            .flatten(),
                        captures: segment.captures,
                        source_index: index,
                    },
                })
                .collect();
        }

        Vec::new()
    }

    fn apply(&self, name: &str, spec: &FieldSpec, method: ExtractionMethod, value: &str) -> Vec<Segment> {
        let raw = match method {
            ExtractionMethod::Skip => return Vec::new(),
            ExtractionMethod::SingleValue => vec![Segment::plain(value)],
            ExtractionMethod::Delimited => match spec.resolved_delimiter() {
                Some(delimiter) if value.contains(delimiter.as_str()) => value
                    .split(delimiter.as_str())
                    .map(Segment::plain)
                    .collect(),
                _ => return Vec::new(),
            },
            ExtractionMethod::BulletList => split_bullets(value)
                .into_iter()
                .map(Segment::plain)
                .collect(),
            ExtractionMethod::SentenceSplit => sentence_spans(value)
                .into_iter()
                .map(|(s, e)| Segment::plain(&value[s..e]))
                .collect(),
            ExtractionMethod::Structured => match self.patterns.get(name) {
                Some(regex) => structured_matches(regex, value),
                None => return Vec::new(),
            },
        };

        raw.into_iter()
            .filter_map(|mut segment| {
                if spec.trim {
                    segment.text = segment.text.trim().to_string();
                }
                let keep = !segment.text.trim().is_empty()
                    && segment.text.chars().count() >= spec.min_claim_length;
                keep.then_some(segment)
            })
            .collect()
    }
}

/// Items of a bullet or numbered list; empty when there are no markers.
fn split_bullets(value: &str) -> Vec<&str> {
    let markers: Vec<_> = BULLET_PATTERN.find_iter(value).collect();
    if markers.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let preamble = value[..markers[0].start()].trim();
    if !preamble.is_empty() {
        items.push(preamble);
    }
    for (i, marker) in markers.iter().enumerate() {
        let end = markers.get(i + 1).map_or(value.len(), |next| next.start());
        items.push(&value[marker.end()..end]);
    }
    items
}

/// One segment per regex match: named groups joined by a space, or the
/// whole match when the pattern has no named groups.
fn structured_matches(regex: &Regex, value: &str) -> Vec<Segment> {
    let names: Vec<&str> = regex.capture_names().flatten().collect();
    regex
        .captures_iter(value)
        .filter_map(|caps| {
            let whole = caps.get(0)?.as_str();
            if names.is_empty() {
                return Some(Segment::plain(whole));
            }
            let captures: BTreeMap<String, String> = names
                .iter()
                .filter_map(|n| caps.name(n).map(|m| (n.to_string(), m.as_str().trim().to_string())))
                .filter(|(_, v)| !v.is_empty())
                .collect();
            let text = names
                .iter()
                .filter_map(|n| captures.get(*n).map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            Some(Segment { text, captures })
        })
        .collect()
}

/// Compile `schema` and extract in one call.
pub fn extract(fields: &BTreeMap<String, String>, schema: &ExtractionSchema) -> Result<Vec<Claim>, ConfigError> {
    Ok(ClaimExtractor::new(schema)?.extract(fields))
}
