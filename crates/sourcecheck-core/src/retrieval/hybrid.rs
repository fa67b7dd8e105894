//! Lexical + dense hybrid retrieval.
//!
//! Each BM25 window is scored twice, once by normalised BM25 and once by
//! embedding similarity, and the two are blended with `alpha`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{cosine_similarity, rank, widen, Bm25Config, Bm25Index, Embedder, RetrievalContext, Retriever};
use crate::config::{check_unit, ConfigError};
use crate::evidence::EvidenceSpan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HybridConfig {
    /// Weight of the BM25 score; the embedding score gets `1 - alpha`
    pub alpha: f64,

    /// Blended score below which a window is not evidence
    pub min_score: f64,

    pub bm25: Bm25Config,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            min_score: 0.1,
            bm25: Bm25Config::default(),
        }
    }
}

impl HybridConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        check_unit("retriever_config.alpha", self.alpha)?;
        check_unit("retriever_config.min_score", self.min_score)?;
        self.bm25.validate()
    }
}

pub struct HybridIndex {
    lexical: Bm25Index,
    config: HybridConfig,
    embedder: Arc<dyn Embedder>,
    chunk_vectors: Vec<Vec<f32>>,
}

impl HybridIndex {
    pub fn build(document: &str, config: HybridConfig, embedder: Arc<dyn Embedder>) -> Self {
        let lexical = Bm25Index::build(document, config.bm25.clone());
        let chunk_vectors = (0..lexical.chunk_count())
            .filter_map(|i| lexical.chunk_range(i))
            .map(|(s, e)| embedder.embed(&document[s..e]))
            .collect();
        Self {
            lexical,
            config,
            embedder,
            chunk_vectors,
        }
    }
}

impl Retriever for HybridIndex {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn retrieve(
        &self,
        claim_text: &str,
        top_k: usize,
        _context: Option<&RetrievalContext<'_>>,
    ) -> Vec<EvidenceSpan> {
        let query = self.embedder.embed(claim_text);
        let alpha = self.config.alpha;
        let document = self.lexical.document();

        let spans = self
            .lexical
            .scores(claim_text)
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let lexical = Bm25Index::normalize(raw);
                let dense = self
                    .chunk_vectors
                    .get(i)
                    .map(|v| cosine_similarity(&query, v).max(0.0))
                    .unwrap_or(0.0);
                let blended = alpha * lexical + (1.0 - alpha) * dense;
                if blended <= 0.0 || blended < self.config.min_score {
                    return None;
                }
                let (start, end) = self.lexical.chunk_range(i)?;
                let (start, end) = widen(document, start, end, self.config.bm25.context_window);
                Some(EvidenceSpan::from_document(document, start, end, blended, "hybrid").with_chunk(i))
            })
            .collect();
        rank(spans, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::HashEmbedder;

    #[test]
    fn test_hybrid_blends_scores() {
        let doc = "Persistent dry cough for two weeks.";
        let index = HybridIndex::build(doc, HybridConfig::default(), Arc::new(HashEmbedder::default()));
        let spans = index.retrieve("dry cough", 3, None);
        assert_eq!(spans.len(), 1);
        // dense similarity dominates for a single short window
        assert!(spans[0].score > 0.3);
        assert!(spans[0].score <= 1.0);
    }

    #[test]
    fn test_alpha_one_is_pure_lexical() {
        let doc = "Persistent dry cough for two weeks.";
        let config = HybridConfig {
            alpha: 1.0,
            min_score: 0.0,
            ..Default::default()
        };
        let index = HybridIndex::build(doc, config, Arc::new(HashEmbedder::default()));
        let spans = index.retrieve("dry cough", 3, None);
        let raw = index.lexical.scores("dry cough")[0];
        assert!((spans[0].score - Bm25Index::normalize(raw)).abs() < 1e-9);
    }
}
