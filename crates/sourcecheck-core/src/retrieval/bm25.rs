//! Okapi BM25 over overlapping character windows.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{char_windows, rank, widen, RetrievalContext, Retriever};
use crate::config::{check_unit, ConfigError};
use crate::evidence::EvidenceSpan;
use crate::text::tokenize;

/// BM25 index parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Bm25Config {
    /// Window size in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive windows
    pub overlap: usize,

    /// Term-frequency saturation
    pub k1: f64,

    /// Length normalisation
    pub b: f64,

    /// Characters of context added on each side of a matching window
    pub context_window: usize,

    /// Raw BM25 score below which a window is not evidence
    pub min_score: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            overlap: 50,
            k1: 1.5,
            b: 0.75,
            context_window: 150,
            min_score: 0.1,
        }
    }
}

impl Bm25Config {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("retriever_config.chunk_size", "must be positive"));
        }
        if self.overlap >= self.chunk_size {
            return Err(ConfigError::invalid(
                "retriever_config.overlap",
                "must be smaller than chunk_size",
            ));
        }
        if !(self.k1 >= 0.0) {
            return Err(ConfigError::invalid("retriever_config.k1", "must be non-negative"));
        }
        check_unit("retriever_config.b", self.b)
    }
}

/// Scores above this map to a normalised relevance of 1.0.
const SCORE_SCALE: f64 = 10.0;

#[derive(Debug, Clone)]
struct Chunk {
    start: usize,
    end: usize,
    term_freq: HashMap<String, usize>,
    len: usize,
}

/// BM25 index over one document.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    document: String,
    config: Bm25Config,
    chunks: Vec<Chunk>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
}

impl Bm25Index {
    pub fn build(document: &str, config: Bm25Config) -> Self {
        let chunks: Vec<Chunk> = char_windows(document, config.chunk_size, config.overlap)
            .into_iter()
            .map(|(start, end)| {
                let tokens = tokenize(&document[start..end]);
                let len = tokens.len();
                let mut term_freq = HashMap::new();
                for token in tokens {
                    *term_freq.entry(token).or_insert(0) += 1;
                }
                Chunk {
                    start,
                    end,
                    term_freq,
                    len,
                }
            })
            .collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for chunk in &chunks {
            for term in chunk.term_freq.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let total: usize = chunks.iter().map(|c| c.len).sum();
        let avg_len = if chunks.is_empty() {
            0.0
        } else {
            total as f64 / chunks.len() as f64
        };

        tracing::info!(
            chunks = chunks.len(),
            terms = doc_freq.len(),
            "built bm25 index"
        );

        Self {
            document: document.to_string(),
            config,
            chunks,
            doc_freq,
            avg_len,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn chunk_range(&self, index: usize) -> Option<(usize, usize)> {
        self.chunks.get(index).map(|c| (c.start, c.end))
    }

    /// Non-negative IDF: `ln(1 + (N - n + 0.5) / (n + 0.5))`.
    fn idf(&self, term: &str) -> f64 {
        let n = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
        let total = self.chunks.len() as f64;
        (1.0 + (total - n + 0.5) / (n + 0.5)).ln()
    }

    /// Raw BM25 score of every chunk for `query`.
    pub(crate) fn scores(&self, query: &str) -> Vec<f64> {
        let terms = tokenize(query);
        let Bm25Config { k1, b, .. } = self.config;
        self.chunks
            .iter()
            .map(|chunk| {
                let norm = if self.avg_len > 0.0 {
                    1.0 - b + b * chunk.len as f64 / self.avg_len
                } else {
                    1.0
                };
                terms
                    .iter()
                    .filter_map(|term| {
                        let tf = *chunk.term_freq.get(term)? as f64;
                        Some(self.idf(term) * tf * (k1 + 1.0) / (tf + k1 * norm))
                    })
                    .sum()
            })
            .collect()
    }

    /// Map a raw score onto [0, 1].
    pub(crate) fn normalize(score: f64) -> f64 {
        (score / SCORE_SCALE).clamp(0.0, 1.0)
    }

    pub(crate) fn search(&self, query: &str, top_k: usize, retriever: &str) -> Vec<EvidenceSpan> {
        let spans = self
            .scores(query)
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0 && *score >= self.config.min_score)
            .map(|(i, score)| {
                let chunk = &self.chunks[i];
                let (start, end) = widen(&self.document, chunk.start, chunk.end, self.config.context_window);
                EvidenceSpan::from_document(&self.document, start, end, Self::normalize(score), retriever)
                    .with_chunk(i)
            })
            .collect();
        rank(spans, top_k)
    }
}

impl Retriever for Bm25Index {
    fn name(&self) -> &str {
        "bm25"
    }

    fn retrieve(
        &self,
        claim_text: &str,
        top_k: usize,
        _context: Option<&RetrievalContext<'_>>,
    ) -> Vec<EvidenceSpan> {
        self.search(claim_text, top_k, "bm25")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Patient denies chest pain. No fever noted.";

    #[test]
    fn test_single_chunk_document_still_scores() {
        let index = Bm25Index::build(DOC, Bm25Config::default());
        assert_eq!(index.chunk_count(), 1);
        let spans = index.retrieve("Patient has fever", 3, None);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, DOC);
        assert!(spans[0].score > 0.0 && spans[0].score <= 1.0);
        assert_eq!(spans[0].retriever, "bm25");
    }

    #[test]
    fn test_unrelated_claim_returns_nothing() {
        let index = Bm25Index::build(DOC, Bm25Config::default());
        assert!(index.retrieve("Quarterly revenue grew", 3, None).is_empty());
    }

    #[test]
    fn test_ranks_matching_chunk_first() {
        let doc = "The patient reports a persistent dry cough for two weeks. \
                   Blood pressure was normal at the visit. \
                   Plan: chest x-ray and follow up in one week.";
        let config = Bm25Config {
            chunk_size: 60,
            overlap: 10,
            context_window: 0,
            ..Default::default()
        };
        let index = Bm25Index::build(doc, config);
        let spans = index.retrieve("blood pressure normal", 2, None);
        assert!(!spans.is_empty());
        assert!(spans[0].text.to_lowercase().contains("blood pressure"));
        assert!(spans.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_top_k_bounds_results() {
        let doc = "fever ".repeat(200);
        let config = Bm25Config {
            chunk_size: 50,
            overlap: 0,
            min_score: 0.0,
            ..Default::default()
        };
        let index = Bm25Index::build(&doc, config);
        assert_eq!(index.retrieve("fever", 4, None).len(), 4);
    }

    #[test]
    fn test_empty_document() {
        let index = Bm25Index::build("", Bm25Config::default());
        assert!(index.retrieve("anything", 5, None).is_empty());
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let config = Bm25Config {
            chunk_size: 10,
            overlap: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
