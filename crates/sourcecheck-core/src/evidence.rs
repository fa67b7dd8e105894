//! Evidence spans retrieved from the source document.
//!
//! Every span points at a byte range of the document it was retrieved
//! from, so downstream stages (and reviewers) can re-read the exact text
//! a verdict rests on.

use serde::{Deserialize, Serialize};

/// A scored excerpt of the source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceSpan {
    /// The excerpt itself
    pub text: String,

    /// Byte offset of the excerpt start in the source document
    pub start: usize,

    /// Byte offset one past the excerpt end
    pub end: usize,

    /// Index of the retrieval chunk that matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,

    /// Relevance score on the retriever's own scale
    pub score: f64,

    /// Retriever that produced the span
    pub retriever: String,
}

impl EvidenceSpan {
    /// Slice `document[start..end]` into a span.
    ///
    /// Offsets are widened outward to the nearest char boundaries and
    /// clamped to the document length.
    pub fn from_document(
        document: &str,
        start: usize,
        end: usize,
        score: f64,
        retriever: impl Into<String>,
    ) -> Self {
        let (start, end) = snap_range(document, start, end);
        Self {
            text: document[start..end].to_string(),
            start,
            end,
            chunk_index: None,
            score,
            retriever: retriever.into(),
        }
    }

    pub fn with_chunk(mut self, index: usize) -> Self {
        self.chunk_index = Some(index);
        self
    }

    /// Audit pointer, e.g. `document[42:97]`.
    pub fn pointer(&self) -> String {
        format!("document[{}:{}]", self.start, self.end)
    }

    /// Whether the span text is exactly the document slice it claims.
    pub fn matches_document(&self, document: &str) -> bool {
        document
            .get(self.start..self.end)
            .map(|slice| slice == self.text)
            .unwrap_or(false)
    }
}

/// Clamp a byte range to `text` and widen it to char boundaries.
pub fn snap_range(text: &str, start: usize, end: usize) -> (usize, usize) {
    let mut start = start.min(text.len());
    let mut end = end.min(text.len()).max(start);
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    (start, end)
}

/// Concatenate span texts for validators that reason over all evidence.
pub fn joined_text(spans: &[EvidenceSpan]) -> String {
    spans
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
