//! Evidence retrieval.
//!
//! A retriever index is built once per (document, kind, config) and then
//! queried per claim. Every kind implements [`Retriever`], so the rest of
//! the pipeline never knows which one is in use. A query with no matches
//! returns an empty list, never an error.

mod bm25;
mod cache;
mod context_aware;
mod hybrid;
mod keyword;
mod semantic;

pub use bm25::{Bm25Config, Bm25Index};
pub use cache::{CacheStats, RetrieverCache, DEFAULT_MAX_ENTRIES};
pub use context_aware::{ContextAwareBm25, ContextAwareConfig};
pub use hybrid::{HybridConfig, HybridIndex};
pub use keyword::{KeywordConfig, KeywordIndex};
pub use semantic::{cosine_similarity, Embedder, HashEmbedder, SemanticConfig, SemanticIndex};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{parse_params, ConfigError};
use crate::evidence::EvidenceSpan;

/// Sibling field values available to context-expanding retrievers.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalContext<'a> {
    /// Field the claim came from
    pub field: &'a str,

    /// All field values of the record being verified
    pub fields: &'a BTreeMap<String, String>,
}

/// A built index over one document.
pub trait Retriever: Send + Sync {
    /// Name recorded on every span this retriever produces.
    fn name(&self) -> &str;

    /// Up to `top_k` spans, best first.
    fn retrieve(
        &self,
        claim_text: &str,
        top_k: usize,
        context: Option<&RetrievalContext<'_>>,
    ) -> Vec<EvidenceSpan>;
}

/// Shared handle to a built index.
pub type RetrieverIndex = Arc<dyn Retriever>;

/// Registered retriever kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverKind {
    Bm25,
    Keyword,
    ContextAwareBm25,
    Semantic,
    Hybrid,
}

impl RetrieverKind {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "bm25" => Ok(Self::Bm25),
            "keyword" => Ok(Self::Keyword),
            "context_aware_bm25" => Ok(Self::ContextAwareBm25),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ConfigError::UnknownRetriever(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bm25 => "bm25",
            Self::Keyword => "keyword",
            Self::ContextAwareBm25 => "context_aware_bm25",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrieverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed retriever configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RetrieverSettings {
    Bm25(Bm25Config),
    Keyword(KeywordConfig),
    ContextAwareBm25(ContextAwareConfig),
    Semantic(SemanticConfig),
    Hybrid(HybridConfig),
}

impl RetrieverSettings {
    /// Parse the policy's `retriever` / `retriever_config` pair.
    pub fn from_parts(kind: &str, config: &serde_json::Value) -> Result<Self, ConfigError> {
        let kind = RetrieverKind::parse(kind)?;
        let component = format!("retriever {}", kind);
        let settings = match kind {
            RetrieverKind::Bm25 => Self::Bm25(parse_params(&component, config)?),
            RetrieverKind::Keyword => Self::Keyword(parse_params(&component, config)?),
            RetrieverKind::ContextAwareBm25 => Self::ContextAwareBm25(parse_params(&component, config)?),
            RetrieverKind::Semantic => Self::Semantic(parse_params(&component, config)?),
            RetrieverKind::Hybrid => Self::Hybrid(parse_params(&component, config)?),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn kind(&self) -> RetrieverKind {
        match self {
            Self::Bm25(_) => RetrieverKind::Bm25,
            Self::Keyword(_) => RetrieverKind::Keyword,
            Self::ContextAwareBm25(_) => RetrieverKind::ContextAwareBm25,
            Self::Semantic(_) => RetrieverKind::Semantic,
            Self::Hybrid(_) => RetrieverKind::Hybrid,
        }
    }

    /// Canonical serialization, used in cache keys.
    ///
    /// Struct fields serialize in declaration order and maps are sorted,
    /// so equal settings always produce equal strings.
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Bm25(c) => c.validate(),
            Self::Keyword(c) => c.validate(),
            Self::ContextAwareBm25(c) => c.bm25.validate(),
            Self::Semantic(c) => c.validate(),
            Self::Hybrid(c) => c.validate(),
        }
    }

    /// Build an index over `document`.
    pub fn build(&self, document: &str, embedder: &Arc<dyn Embedder>) -> RetrieverIndex {
        match self {
            Self::Bm25(c) => Arc::new(Bm25Index::build(document, c.clone())),
            Self::Keyword(c) => Arc::new(KeywordIndex::build(document, c.clone())),
            Self::ContextAwareBm25(c) => Arc::new(ContextAwareBm25::build(document, c.clone())),
            Self::Semantic(c) => Arc::new(SemanticIndex::build(document, c.clone(), embedder.clone())),
            Self::Hybrid(c) => Arc::new(HybridIndex::build(document, c.clone(), embedder.clone())),
        }
    }
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self::Bm25(Bm25Config::default())
    }
}

/// Sort best first, breaking ties by document position, and keep `top_k`.
pub(crate) fn rank(mut spans: Vec<EvidenceSpan>, top_k: usize) -> Vec<EvidenceSpan> {
    spans.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.start.cmp(&b.start))
    });
    spans.truncate(top_k);
    spans
}

/// Character-window chunking shared by the BM25 family.
///
/// Returns byte ranges of windows of `size` chars advancing by
/// `size - overlap` chars; the last window ends at the document end.
pub(crate) fn char_windows(document: &str, size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let offsets: Vec<usize> = document
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(document.len()))
        .collect();
    let total = offsets.len() - 1;
    if total == 0 {
        return Vec::new();
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(total);
        windows.push((offsets[start], offsets[end]));
        if end == total {
            break;
        }
        start += step;
    }
    windows
}

/// Widen `[start, end)` by `window` chars on each side.
pub(crate) fn widen(document: &str, start: usize, end: usize, window: usize) -> (usize, usize) {
    let before = document[..start]
        .char_indices()
        .rev()
        .nth(window.saturating_sub(1))
        .map(|(i, _)| i);
    let new_start = if window == 0 { start } else { before.unwrap_or(0) };
    let new_end = document[end..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| end + i)
        .unwrap_or(document.len());
    (new_start, new_end)
}
