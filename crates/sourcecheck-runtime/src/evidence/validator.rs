//! Span validation ensures agent-cited evidence has referential integrity.
//!
//! Agents cite evidence as spans of the source document. If a span is
//! out of bounds or its text is not what the document says there, the
//! agent's vote is discarded and the fallback runs. Spans are never
//! repaired.

use sourcecheck_core::text::normalize_whitespace;
use sourcecheck_core::EvidenceSpan;
use thiserror::Error;

/// Errors from span validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpanValidationError {
    #[error("Inverted range: {pointer}")]
    InvertedRange { pointer: String },

    #[error("Span out of bounds: {pointer} (requested end {requested_end}, document length {actual_length})")]
    OutOfBounds {
        pointer: String,
        requested_end: usize,
        actual_length: usize,
    },

    #[error("Span boundary inside a character: {pointer}")]
    NotCharBoundary { pointer: String },

    #[error("Quote mismatch at {pointer}: expected '{expected}', found '{actual}'")]
    QuoteMismatch {
        pointer: String,
        expected: String,
        actual: String,
    },
}

/// Checks spans against the one document they claim to come from.
///
/// # Validation Steps
/// 1. The byte range is ordered and in-bounds
/// 2. Both ends fall on char boundaries
/// 3. The span text matches the referenced slice (whitespace-normalised)
pub struct SpanValidator<'a> {
    document: &'a str,
}

impl<'a> SpanValidator<'a> {
    pub fn new(document: &'a str) -> Self {
        Self { document }
    }

    pub fn validate_all(&self, spans: &[EvidenceSpan]) -> Result<(), SpanValidationError> {
        spans.iter().try_for_each(|span| self.validate(span))
    }

    pub fn validate(&self, span: &EvidenceSpan) -> Result<(), SpanValidationError> {
        let slice = self.slice(span)?;
        if normalize_whitespace(slice) != normalize_whitespace(&span.text) {
            return Err(SpanValidationError::QuoteMismatch {
                pointer: span.pointer(),
                expected: span.text.clone(),
                actual: slice.to_string(),
            });
        }
        Ok(())
    }

    fn slice(&self, span: &EvidenceSpan) -> Result<&'a str, SpanValidationError> {
        if span.start > span.end {
            return Err(SpanValidationError::InvertedRange {
                pointer: span.pointer(),
            });
        }
        if span.end > self.document.len() {
            return Err(SpanValidationError::OutOfBounds {
                pointer: span.pointer(),
                requested_end: span.end,
                actual_length: self.document.len(),
            });
        }
        self.document
            .get(span.start..span.end)
            .ok_or_else(|| SpanValidationError::NotCharBoundary {
                pointer: span.pointer(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DOCUMENT: &str = "Patient reports   chest pain since Monday. Café visit noted.";

    fn span(start: usize, end: usize, text: &str) -> EvidenceSpan {
        EvidenceSpan {
            text: text.to_string(),
            start,
            end,
            chunk_index: None,
            score: 1.0,
            retriever: "agent".to_string(),
        }
    }

    #[test]
    fn test_valid_span() {
        let validator = SpanValidator::new(DOCUMENT);
        assert!(validator.validate(&span(0, 7, "Patient")).is_ok());
    }

    #[test]
    fn test_out_of_bounds() {
        let validator = SpanValidator::new(DOCUMENT);
        let result = validator.validate(&span(0, 500, "Patient"));
        assert!(matches!(result, Err(SpanValidationError::OutOfBounds { requested_end: 500, .. })));
    }

    #[test]
    fn test_inverted_range() {
        let validator = SpanValidator::new(DOCUMENT);
        assert!(matches!(
            validator.validate(&span(9, 3, "")),
            Err(SpanValidationError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_quote_mismatch() {
        let validator = SpanValidator::new(DOCUMENT);
        let result = validator.validate(&span(0, 7, "Doctor!"));
        assert!(matches!(result, Err(SpanValidationError::QuoteMismatch { .. })));
    }

    #[test]
    fn test_char_boundary() {
        let start = DOCUMENT.find("Café").unwrap();
        let validator = SpanValidator::new(DOCUMENT);
        // 'é' is two bytes; end one byte into it
        let result = validator.validate(&span(start, start + 4, "Caf"));
        assert!(matches!(result, Err(SpanValidationError::NotCharBoundary { .. })));
    }

    #[test]
    fn test_whitespace_normalization() {
        let validator = SpanValidator::new(DOCUMENT);
        assert!(validator.validate(&span(8, 28, "reports chest pain")).is_ok());
    }

    #[test]
    fn test_validate_all_stops_at_first_bad_span() {
        let validator = SpanValidator::new(DOCUMENT);
        let spans = vec![span(0, 7, "Patient"), span(0, 7, "nobody")];
        assert!(validator.validate_all(&spans).is_err());
        assert!(validator.validate_all(&spans[..1]).is_ok());
    }

    proptest! {
        #[test]
        fn prop_spans_sliced_from_document_validate(a in 0usize..80, b in 0usize..80) {
            let (start, end) = (a.min(b), a.max(b));
            let span = EvidenceSpan::from_document(DOCUMENT, start, end, 0.5, "agent");
            prop_assert!(SpanValidator::new(DOCUMENT).validate(&span).is_ok());
        }
    }
}
