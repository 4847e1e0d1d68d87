//! Text Normalization Pipeline
//!
//! The deterministic token pipeline shared by the coordinator (query terms)
//! and the workers (document bodies). Both sides must produce byte-identical
//! token streams for the same input, otherwise lookups silently miss.
//!
//! Pipeline, in fixed order:
//! 1. Lowercase the whole string (Unicode-aware).
//! 2. Tokenize on word boundaries; drop tokens that are not purely alphabetic.
//! 3. Drop stopwords for the selected language.
//! 4. Stem each surviving token.
//! 5. Emit tokens in original positional order, duplicates preserved.

mod language;
mod stopwords;

pub use language::Language;

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("valid token regex"));

/// Normalizes `text` into an ordered list of stemmed tokens.
///
/// Duplicates are preserved; the caller counts them.
pub fn normalize(text: &str, language: Language) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stopwords = language.stopwords();
    let stemmer = language.stemmer();

    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| token.chars().all(char::is_alphabetic))
        .filter(|token| !stopwords.contains(*token))
        .map(|token| stemmer.stem(token).into_owned())
        .collect()
}

#[cfg(test)]
mod tests;
