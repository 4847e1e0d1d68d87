use super::stopwords;
use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;

// Language resources are lazily initialized on first use and shared for the
// process lifetime, so repeated normalization calls cost nothing extra.
static ENGLISH_STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));
static SPANISH_STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::Spanish));

static ENGLISH_STOPWORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| stopwords::ENGLISH.iter().copied().collect());
static SPANISH_STOPWORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| stopwords::SPANISH.iter().copied().collect());

/// The closed set of supported processing languages.
///
/// Adding a language means adding a stopword list and a stemmer here; nothing
/// else in the system changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
}

impl Language {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "english" => Some(Language::English),
            "spanish" => Some(Language::Spanish),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Spanish => "spanish",
        }
    }

    pub(crate) fn stemmer(&self) -> &'static Stemmer {
        match self {
            Language::English => &ENGLISH_STEMMER,
            Language::Spanish => &SPANISH_STEMMER,
        }
    }

    pub(crate) fn stopwords(&self) -> &'static HashSet<&'static str> {
        match self {
            Language::English => &ENGLISH_STOPWORDS,
            Language::Spanish => &SPANISH_STOPWORDS,
        }
    }
}
