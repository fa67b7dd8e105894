//! Shared text patterns and tokenization.
//!
//! Extraction, retrieval, validators and quality modules all need the same
//! notion of "word", "sentence" and "negated term". Keeping the patterns
//! here means a claim and its evidence are always tokenized the same way.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

lazy_static! {
    // =========================================================================
    // TOKENS AND BOUNDARIES
    // =========================================================================

    /// Lower-case word token, keeping simple contractions ("doesn't")
    pub static ref WORD_PATTERN: Regex = Regex::new(r"[a-z0-9]+(?:'[a-z]+)?").unwrap();

    /// Sentence terminator followed by whitespace or end of text
    pub static ref SENTENCE_END_PATTERN: Regex = Regex::new(r"[.!?]+(?:\s+|$)").unwrap();

    /// Bullet or numbered-list marker at line start
    pub static ref BULLET_PATTERN: Regex = Regex::new(r"(?m)^\s*(?:[-*•]|\d+[.)])\s+").unwrap();

    // =========================================================================
    // DETAIL PATTERNS (quality analysis)
    // =========================================================================

    /// Number with a unit, e.g. "3.5 cm", "20 mg", "2 weeks"
    pub static ref MEASUREMENT_PATTERN: Regex = Regex::new(
        r"(?i)\b(\d+(?:\.\d+)?)\s*(cm|mm|mg|kg|lbs?|g|ml|years?|months?|days?|hours?|minutes?|weeks?)\b"
    ).unwrap();

    /// Capitalised word run, candidate proper noun
    pub static ref PROPER_NOUN_PATTERN: Regex = Regex::new(
        r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b"
    ).unwrap();

    /// Double-quoted phrase of at least three characters
    pub static ref QUOTED_PATTERN: Regex = Regex::new(r#""([^"]{3,})""#).unwrap();

    // =========================================================================
    // WORD LISTS
    // =========================================================================

    static ref STOPWORDS: HashSet<&'static str> = [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
        "is", "was", "were", "are", "been", "be", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "could", "should", "may", "might",
        "must", "can", "of", "with", "from", "by", "as", "this", "that", "these",
        "those", "it", "its", "he", "she", "they", "his", "her", "their", "them",
        "i", "we", "you", "me", "my", "our", "your", "there", "here", "so", "if",
        "then", "than", "also", "very", "just", "about", "into", "over", "some",
        "any", "all", "which", "who", "what", "when", "where", "how",
    ]
    .into_iter()
    .collect();

    static ref NEGATION_CUES: HashSet<&'static str> = [
        "no", "not", "denies", "denied", "deny", "denying", "without", "never",
        "negative", "none", "absent", "nor", "neither", "free",
    ]
    .into_iter()
    .collect();

    /// Words that close a negation scope
    static ref SCOPE_BREAKERS: HashSet<&'static str> =
        ["but", "however", "although", "though", "except", "yet"].into_iter().collect();

    static ref ABBREVIATIONS: HashSet<&'static str> = [
        "dr", "mr", "mrs", "ms", "prof", "sr", "jr", "st", "vs", "etc", "e.g",
        "i.e", "approx", "fig", "inc", "ltd",
    ]
    .into_iter()
    .collect();
}

/// Tokens within this many words after a cue are negated.
const NEGATION_SCOPE: usize = 5;

/// Lower-case word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

pub fn is_negation_cue(token: &str) -> bool {
    NEGATION_CUES.contains(token) || token.ends_with("n't")
}

/// Tokens that carry meaning: no stopwords, no negation cues.
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stopword(t) && !is_negation_cue(t))
        .collect()
}

pub fn content_set(text: &str) -> HashSet<String> {
    content_tokens(text).into_iter().collect()
}

/// Content terms of `text` paired with whether they sit inside a
/// negation scope of their sentence.
pub fn polarized_terms(text: &str) -> Vec<(String, bool)> {
    let mut terms = Vec::new();
    for sentence in sentences(text) {
        let mut scope_left = 0usize;
        for token in tokenize(sentence) {
            if is_negation_cue(&token) {
                scope_left = NEGATION_SCOPE;
                continue;
            }
            if SCOPE_BREAKERS.contains(token.as_str()) {
                scope_left = 0;
                continue;
            }
            let negated = scope_left > 0;
            scope_left = scope_left.saturating_sub(1);
            if !is_stopword(&token) {
                terms.push((token, negated));
            }
        }
    }
    terms
}

/// Polarity observed for a term across a text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Polarity {
    pub affirmed: bool,
    pub negated: bool,
}

pub fn polarity_map(text: &str) -> HashMap<String, Polarity> {
    let mut map: HashMap<String, Polarity> = HashMap::new();
    for (term, negated) in polarized_terms(text) {
        let entry = map.entry(term).or_default();
        if negated {
            entry.negated = true;
        } else {
            entry.affirmed = true;
        }
    }
    map
}

/// Byte ranges of the sentences in `text`, trimmed.
///
/// A terminator directly after a known abbreviation ("Dr.", "e.g.") does
/// not end the sentence.
pub fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END_PATTERN.find_iter(text) {
        if ends_with_abbreviation(&text[start..m.start()]) {
            continue;
        }
        let punct_end = m.start() + m.as_str().trim_end().len();
        push_trimmed(text, start, punct_end, &mut spans);
        start = m.end();
    }
    push_trimmed(text, start, text.len(), &mut spans);
    spans
}

pub fn sentences(text: &str) -> Vec<&str> {
    sentence_spans(text)
        .into_iter()
        .map(|(s, e)| &text[s..e])
        .collect()
}

fn ends_with_abbreviation(head: &str) -> bool {
    let Some(last) = head.split_whitespace().last() else {
        return false;
    };
    let word = last.trim_start_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    ABBREVIATIONS.contains(word.as_str())
        || (word.len() == 1 && last.chars().all(|c| c.is_ascii_uppercase()))
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<(usize, usize)>) {
    if start >= end {
        return;
    }
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = slice.len() - slice.trim_start().len();
    spans.push((start + lead, start + lead + trimmed.len()));
}

/// Jaccard similarity of lower-cased whitespace token sets.
pub fn jaccard_overlap(a: &str, b: &str) -> f64 {
    let a: HashSet<String> = a.split_whitespace().map(|t| t.to_lowercase()).collect();
    let b: HashSet<String> = b.split_whitespace().map(|t| t.to_lowercase()).collect();
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;
    intersection / union
}

/// Collapse runs of whitespace to single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shorten `s` to at most `max_chars` characters, appending "..." when cut.
pub fn snippet(s: &str, max_chars: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_keeps_contractions() {
        assert_eq!(tokenize("Patient DOESN'T smoke."), vec!["patient", "doesn't", "smoke"]);
    }

    #[test]
    fn test_content_tokens_drop_stopwords_and_cues() {
        assert_eq!(content_tokens("Patient has no fever"), vec!["patient", "fever"]);
    }

    #[test]
    fn test_negation_scope_is_sentence_local() {
        let terms = polarized_terms("Patient denies chest pain. Fever noted.");
        assert!(terms.contains(&("patient".to_string(), false)));
        assert!(terms.contains(&("chest".to_string(), true)));
        assert!(terms.contains(&("pain".to_string(), true)));
        assert!(terms.contains(&("fever".to_string(), false)));
    }

    #[test]
    fn test_scope_breaker_ends_negation() {
        let map = polarity_map("No cough but fever present");
        assert!(map["cough"].negated);
        assert!(map["fever"].affirmed && !map["fever"].negated);
    }

    #[test]
    fn test_sentences_guard_abbreviations() {
        let text = "Seen by Dr. Smith today. Follow up in 2 weeks! Any questions?";
        assert_eq!(
            sentences(text),
            vec!["Seen by Dr. Smith today.", "Follow up in 2 weeks!", "Any questions?"]
        );
    }

    #[test]
    fn test_sentences_keep_decimals() {
        assert_eq!(sentences("Lesion is 3.5 cm wide"), vec!["Lesion is 3.5 cm wide"]);
    }

    #[test]
    fn test_jaccard_overlap() {
        let overlap = jaccard_overlap("patient denies fever", "Patient denies fever today");
        assert!((overlap - 0.75).abs() < 1e-9);
        assert_eq!(jaccard_overlap("", ""), 0.0);
    }

    #[test]
    fn test_bullet_pattern() {
        assert!(BULLET_PATTERN.is_match("- fever\n- cough"));
        assert!(BULLET_PATTERN.is_match("1. fever"));
        assert!(BULLET_PATTERN.is_match("2) cough"));
        assert!(!BULLET_PATTERN.is_match("fever and cough"));
    }

    #[test]
    fn test_snippet_truncates_on_chars() {
        assert_eq!(snippet("abcdef", 3), "abc...");
        assert_eq!(snippet("  abc ", 5), "abc");
    }
}
