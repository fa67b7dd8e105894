//! Dense retrieval over sentences.
//!
//! Embeddings come from an [`Embedder`]. The default [`HashEmbedder`]
//! hashes content words into a fixed number of buckets, which needs no
//! model files and keeps the pipeline deterministic; a real sentence
//! encoder can be plugged in behind the same trait.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{rank, widen, RetrievalContext, Retriever};
use crate::config::{check_unit, ConfigError};
use crate::evidence::EvidenceSpan;
use crate::text::{content_tokens, sentence_spans};

/// Text to vector encoder.
pub trait Embedder: Send + Sync {
    /// Identifies the model in cache keys.
    fn name(&self) -> &str;

    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Feature-hashing bag-of-words embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash-bow"
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in content_tokens(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

/// Cosine similarity; 0.0 for zero vectors or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na * nb)) as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SemanticConfig {
    /// Sentences below this similarity are not evidence
    pub min_similarity: f64,

    /// Characters of context added on each side of a sentence
    pub context_window: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.3,
            context_window: 0,
        }
    }
}

impl SemanticConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        check_unit("retriever_config.min_similarity", self.min_similarity)
    }
}

pub struct SemanticIndex {
    document: String,
    config: SemanticConfig,
    embedder: Arc<dyn Embedder>,
    sentences: Vec<(usize, usize, Vec<f32>)>,
}

impl SemanticIndex {
    pub fn build(document: &str, config: SemanticConfig, embedder: Arc<dyn Embedder>) -> Self {
        let sentences = sentence_spans(document)
            .into_iter()
            .map(|(s, e)| (s, e, embedder.embed(&document[s..e])))
            .collect::<Vec<_>>();
        tracing::info!(sentences = sentences.len(), embedder = embedder.name(), "built semantic index");
        Self {
            document: document.to_string(),
            config,
            embedder,
            sentences,
        }
    }
}

impl Retriever for SemanticIndex {
    fn name(&self) -> &str {
        "semantic"
    }

    fn retrieve(
        &self,
        claim_text: &str,
        top_k: usize,
        _context: Option<&RetrievalContext<'_>>,
    ) -> Vec<EvidenceSpan> {
        let query = self.embedder.embed(claim_text);
        let spans = self
            .sentences
            .iter()
            .enumerate()
            .filter_map(|(i, (start, end, vector))| {
                let similarity = cosine_similarity(&query, vector);
                if similarity <= 0.0 || similarity < self.config.min_similarity {
                    return None;
                }
                let (s, e) = widen(&self.document, *start, *end, self.config.context_window);
                Some(EvidenceSpan::from_document(&self.document, s, e, similarity, "semantic").with_chunk(i))
            })
            .collect();
        rank(spans, top_k)
    }
}
