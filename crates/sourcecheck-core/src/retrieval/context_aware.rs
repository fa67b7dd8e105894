//! BM25 with query expansion for terse claims.
//!
//! A one- or two-word claim ("fever") is a weak BM25 query. When a claim
//! is at most `terse_threshold` words long the query is expanded with the
//! values of related fields from the same record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Bm25Config, Bm25Index, RetrievalContext, Retriever};
use crate::evidence::EvidenceSpan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ContextAwareConfig {
    /// Claims with at most this many words get expanded
    pub terse_threshold: usize,

    /// Characters of related-field text appended to the query
    pub max_context_length: usize,

    /// field -> fields whose values expand its claims; unlisted fields
    /// use every other field
    pub field_relationships: BTreeMap<String, Vec<String>>,

    pub bm25: Bm25Config,
}

impl Default for ContextAwareConfig {
    fn default() -> Self {
        Self {
            terse_threshold: 3,
            max_context_length: 200,
            field_relationships: BTreeMap::new(),
            bm25: Bm25Config::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextAwareBm25 {
    index: Bm25Index,
    config: ContextAwareConfig,
}

impl ContextAwareBm25 {
    pub fn build(document: &str, config: ContextAwareConfig) -> Self {
        Self {
            index: Bm25Index::build(document, config.bm25.clone()),
            config,
        }
    }

    /// The query actually sent to BM25.
    pub fn expand_query(&self, claim_text: &str, context: Option<&RetrievalContext<'_>>) -> String {
        let Some(ctx) = context else {
            return claim_text.to_string();
        };
        if claim_text.split_whitespace().count() > self.config.terse_threshold {
            return claim_text.to_string();
        }

        let related: Vec<&str> = match self.config.field_relationships.get(ctx.field) {
            Some(names) => names
                .iter()
                .filter_map(|name| ctx.fields.get(name).map(String::as_str))
                .collect(),
            None => ctx
                .fields
                .iter()
                .filter(|(name, _)| name.as_str() != ctx.field)
                .map(|(_, value)| value.as_str())
                .collect(),
        };

        let extra: String = related
            .join(" ")
            .chars()
            .take(self.config.max_context_length)
            .collect();
        if extra.trim().is_empty() {
            return claim_text.to_string();
        }

        format!("{} {}", claim_text, extra.trim())
    }
}

impl Retriever for ContextAwareBm25 {
    fn name(&self) -> &str {
        "context_aware_bm25"
    }

    fn retrieve(
        &self,
        claim_text: &str,
        top_k: usize,
        context: Option<&RetrievalContext<'_>>,
    ) -> Vec<EvidenceSpan> {
        let query = self.expand_query(claim_text, context);
        if query != claim_text {
            tracing::debug!(claim = claim_text, query = %query, "expanded terse claim");
        }
        self.index.search(&query, top_k, "context_aware_bm25")
    }
}
