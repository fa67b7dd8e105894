//! Exact keyword matching with surrounding context.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{rank, widen, RetrievalContext, Retriever};
use crate::config::ConfigError;
use crate::evidence::EvidenceSpan;
use crate::text::{is_negation_cue, is_stopword, tokenize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct KeywordConfig {
    /// Characters kept on each side of a keyword hit
    pub context_window: usize,

    /// Shorter claim words are not treated as keywords
    pub min_keyword_length: usize,

    pub case_sensitive: bool,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            context_window: 100,
            min_keyword_length: 4,
            case_sensitive: false,
        }
    }
}

impl KeywordConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.min_keyword_length == 0 {
            return Err(ConfigError::invalid(
                "retriever_config.min_keyword_length",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Keyword "index": the document plus its config. Matching is done per
/// query since keywords come from the claim.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    document: String,
    config: KeywordConfig,
}

struct Window {
    start: usize,
    end: usize,
    keywords: BTreeSet<usize>,
}

impl KeywordIndex {
    pub fn build(document: &str, config: KeywordConfig) -> Self {
        Self {
            document: document.to_string(),
            config,
        }
    }

    fn keywords(&self, claim_text: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        tokenize(claim_text)
            .into_iter()
            .filter(|t| t.chars().count() >= self.config.min_keyword_length)
            .filter(|t| !is_stopword(t) && !is_negation_cue(t))
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    fn matcher(&self, keyword: &str) -> Option<Regex> {
        RegexBuilder::new(&format!(r"\b{}\b", regex::escape(keyword)))
            .case_insensitive(!self.config.case_sensitive)
            .build()
            .ok()
    }
}

impl Retriever for KeywordIndex {
    fn name(&self) -> &str {
        "keyword"
    }

    fn retrieve(
        &self,
        claim_text: &str,
        top_k: usize,
        _context: Option<&RetrievalContext<'_>>,
    ) -> Vec<EvidenceSpan> {
        let keywords = self.keywords(claim_text);
        if keywords.is_empty() {
            return Vec::new();
        }

        let mut windows: Vec<Window> = Vec::new();
        for (k, keyword) in keywords.iter().enumerate() {
            let Some(regex) = self.matcher(keyword) else {
                continue;
            };
            for m in regex.find_iter(&self.document) {
                let (start, end) = widen(&self.document, m.start(), m.end(), self.config.context_window);
                windows.push(Window {
                    start,
                    end,
                    keywords: BTreeSet::from([k]),
                });
            }
        }

        // Merge overlapping windows so one passage is reported once.
        windows.sort_by_key(|w| (w.start, w.end));
        let mut merged: Vec<Window> = Vec::new();
        for window in windows {
            match merged.last_mut() {
                Some(last) if window.start <= last.end => {
                    last.end = last.end.max(window.end);
                    last.keywords.extend(window.keywords);
                }
                _ => merged.push(window),
            }
        }

        let total = keywords.len() as f64;
        let spans = merged
            .into_iter()
            .map(|w| {
                let score = w.keywords.len() as f64 / total;
                EvidenceSpan::from_document(&self.document, w.start, w.end, score, "keyword")
            })
            .collect();
        rank(spans, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_hits_with_context() {
        let doc = "Morning visit. Patient reports a persistent cough since Monday.";
        let index = KeywordIndex::build(
            doc,
            KeywordConfig {
                context_window: 5,
                ..Default::default()
            },
        );
        let spans = index.retrieve("persistent cough", 3, None);
        assert_eq!(spans.len(), 1);
        assert!(spans[0].text.contains("persistent cough"));
        assert_eq!(spans[0].score, 1.0);
    }

    #[test]
    fn test_short_words_are_not_keywords() {
        let index = KeywordIndex::build("He is ill.", KeywordConfig::default());
        assert!(index.retrieve("is ill", 3, None).is_empty());
    }

    #[test]
    fn test_whole_word_matching() {
        let index = KeywordIndex::build("The feverish child", KeywordConfig::default());
        assert!(index.retrieve("fever", 3, None).is_empty());
    }

    #[test]
    fn test_score_is_keyword_share() {
        let doc = format!("cough here. {} headache there.", "filler ".repeat(60));
        let index = KeywordIndex::build(
            &doc,
            KeywordConfig {
                context_window: 10,
                ..Default::default()
            },
        );
        let spans = index.retrieve("cough headache", 5, None);
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|s| (s.score - 0.5).abs() < 1e-9));
        assert!(spans[0].start < spans[1].start);
    }
}
