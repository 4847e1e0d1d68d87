use super::index::GlobalIndex;
use crate::normalizer::{normalize, Language};

/// Single-term keyword search.
///
/// The raw term goes through the same normalization pipeline as document
/// text; if it normalizes to nothing (punctuation, digits, or a stopword)
/// the result is empty. Multi-token input collapses to its first token —
/// multi-term queries are out of scope and this keeps the behavior
/// predictable.
pub fn search(index: &GlobalIndex, language: Language, raw_term: &str) -> Vec<(String, u64)> {
    let tokens = normalize(raw_term, language);
    let Some(stem) = tokens.first() else {
        tracing::info!("Query '{}' normalized to no tokens", raw_term);
        return Vec::new();
    };
    if tokens.len() > 1 {
        tracing::debug!(
            "Query '{}' normalized to {} tokens; searching only '{}'",
            raw_term,
            tokens.len(),
            stem
        );
    }

    tracing::info!("Searching for '{}' (stem: '{}')", raw_term, stem);
    index.postings(stem)
}
