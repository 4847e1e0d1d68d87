#[cfg(test)]
mod tests {
    use crate::normalizer::{normalize, Language};

    // ============================================================
    // PIPELINE BASICS - English
    // ============================================================

    #[test]
    fn test_normalize_lowercases_and_stems() {
        let tokens = normalize("Cats and dogs and cats", Language::English);

        // "and" is a stopword; plurals are stemmed; duplicates survive in order.
        assert_eq!(tokens, vec!["cat", "dog", "cat"]);
    }

    #[test]
    fn test_normalize_drops_stopwords() {
        let tokens = normalize("the quick brown fox is in the house", Language::English);

        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"is".to_string()));
        assert!(!tokens.contains(&"in".to_string()));
        assert!(tokens.contains(&"quick".to_string()));
        assert!(tokens.contains(&"fox".to_string()));
    }

    #[test]
    fn test_normalize_stems_inflections() {
        let tokens = normalize("reporting reported reports", Language::English);

        assert_eq!(tokens, vec!["report", "report", "report"]);
    }

    #[test]
    fn test_normalize_preserves_positional_order() {
        let tokens = normalize("alpha beta alpha gamma", Language::English);

        assert_eq!(tokens, vec!["alpha", "beta", "alpha", "gamma"]);
    }

    // ============================================================
    // TOKEN FILTERING
    // ============================================================

    #[test]
    fn test_normalize_drops_digits_and_punctuation() {
        let tokens = normalize("rust 2024, version 1.75!", Language::English);

        assert_eq!(tokens, vec!["rust", "version"]);
    }

    #[test]
    fn test_normalize_drops_mixed_alphanumeric_tokens() {
        // \w+ captures "abc123" as one token; the alphabetic filter drops it.
        let tokens = normalize("abc123 plain", Language::English);

        assert_eq!(tokens, vec!["plain"]);
    }

    #[test]
    fn test_normalize_empty_input() {
        assert!(normalize("", Language::English).is_empty());
        assert!(normalize("   \t\n ", Language::English).is_empty());
    }

    #[test]
    fn test_normalize_punctuation_only_input() {
        let tokens = normalize("... !!! ???", Language::English);
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_normalize_stopword_only_input() {
        let tokens = normalize("and the of", Language::English);
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_normalize_contractions_split_into_stopwords() {
        // "don't" tokenizes to "don" + "t", both stopwords.
        let tokens = normalize("don't", Language::English);
        assert!(tokens.is_empty());
    }

    // ============================================================
    // SPANISH
    // ============================================================

    #[test]
    fn test_normalize_spanish_stopwords_and_stemming() {
        let tokens = normalize("El perro corre rápidamente por el parque", Language::Spanish);

        // "el" and "por" are stopwords; the rest are stemmed.
        assert!(!tokens.iter().any(|t| t == "el" || t == "por"));
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], "perr");
        assert!(tokens.contains(&"rapid".to_string()));
    }

    #[test]
    fn test_spanish_stopwords_not_applied_to_english() {
        // "perro" is not an English stopword and English stemming leaves it.
        let english = normalize("el perro", Language::English);
        assert!(english.contains(&"el".to_string()) || english.contains(&"perro".to_string()));

        let spanish = normalize("el perro", Language::Spanish);
        assert_eq!(spanish, vec!["perr"]);
    }

    // ============================================================
    // DETERMINISM
    // ============================================================

    #[test]
    fn test_normalize_is_deterministic() {
        let text = "The workers indexed seventeen documents, quickly and quietly.";
        let first = normalize(text, Language::English);
        let second = normalize(text, Language::English);

        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_query_and_document_normalization_agree() {
        // The same pipeline runs on both sides; a query term must land on
        // the stem the document produced.
        let doc_tokens = normalize("Cats and dogs and cats", Language::English);
        let query_tokens = normalize("cat", Language::English);

        assert_eq!(query_tokens.len(), 1);
        assert!(doc_tokens.contains(&query_tokens[0]));
    }

    // ============================================================
    // LANGUAGE PARSING
    // ============================================================

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("english"), Some(Language::English));
        assert_eq!(Language::parse("SPANISH"), Some(Language::Spanish));
        assert_eq!(Language::parse(" spanish "), Some(Language::Spanish));
        assert_eq!(Language::parse("german"), None);
        assert_eq!(Language::parse(""), None);
    }
}
