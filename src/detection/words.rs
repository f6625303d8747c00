//! Word list canonicalization
//!
//! Expands a user word list into the case, punctuation and plural variants the
//! OCR engine is likely to report for the same word.

use std::collections::HashSet;
use tracing::{debug, warn};

/// Words that are always redacted, whatever the user supplies
pub const DEFAULT_WORDS: [&str; 3] = ["apple", "banana", "password"];

/// Trailing punctuation OCR commonly glues onto a word
pub const PUNCTUATION_MARKS: [&str; 7] = [".", ",", "!", "?", "--", "-", "'"];

/// Variants generated per word: 3 cases, each bare, with every mark, plural
/// and plural with every mark
pub const VARIANTS_PER_WORD: usize = 3 * (1 + PUNCTUATION_MARKS.len()) * 2;

/// Set of word variants matched in exact mode. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalWordSet {
    variants: HashSet<String>,
}

impl CanonicalWordSet {
    pub fn contains(&self, candidate: &str) -> bool {
        self.variants.contains(candidate)
    }
}

/// Build the canonical word set for a session.
///
/// The three [`DEFAULT_WORDS`] are always included. The input is never
/// modified; blank entries are skipped.
pub fn build_word_variations<S: AsRef<str>>(words: &[S]) -> CanonicalWordSet {
    let mut variants = HashSet::new();
    let mut skipped = 0usize;

    let all_words = words
        .iter()
        .map(|w| w.as_ref().trim())
        .chain(DEFAULT_WORDS.iter().copied());

    for word in all_words {
        if word.is_empty() {
            skipped += 1;
            continue;
        }
        variants.extend(word_variations(word));
    }

    if skipped > 0 {
        warn!("Skipped {} blank entries in the word list", skipped);
    }
    debug!(
        "Built {} word variants from {} user words",
        variants.len(),
        words.len()
    );

    CanonicalWordSet { variants }
}

/// All variants of a single word, in generation order (duplicates kept)
pub fn word_variations(word: &str) -> Vec<String> {
    let lower = word.to_lowercase();
    let upper = word.to_uppercase();
    let capitalized = capitalize(word);

    let bases = [lower.clone(), upper.clone(), capitalized.clone()];
    let plurals = [
        format!("{}s", lower),
        format!("{}S", upper),
        format!("{}s", capitalized),
    ];

    let mut out = Vec::with_capacity(VARIANTS_PER_WORD);
    for forms in [&bases, &plurals] {
        out.extend(forms.iter().cloned());
        for mark in PUNCTUATION_MARKS {
            out.extend(forms.iter().map(|form| format!("{}{}", form, mark)));
        }
    }
    out
}

/// First character uppercased, the rest lowercased
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_always_present() {
        let set = build_word_variations(&["invoice"]);
        for word in DEFAULT_WORDS {
            assert!(set.contains(word), "missing default {}", word);
        }

        let empty: [&str; 0] = [];
        let set = build_word_variations(&empty);
        assert!(set.contains("password"));
        assert!(set.contains("BANANAS!"));
    }

    #[test]
    fn test_variants_for_word() {
        let set = build_word_variations(&["sEcReT"]);
        for expected in ["secret", "SECRET", "Secret"] {
            assert!(set.contains(expected));
            for mark in PUNCTUATION_MARKS {
                assert!(set.contains(&format!("{}{}", expected, mark)), "{}{}", expected, mark);
            }
        }
        for plural in ["secrets", "SECRETS", "Secrets"] {
            assert!(set.contains(plural));
            for mark in PUNCTUATION_MARKS {
                assert!(set.contains(&format!("{}{}", plural, mark)));
            }
        }
        assert!(!set.contains("sEcReT"));
    }

    #[test]
    fn test_variant_counts_are_deterministic() {
        assert_eq!(VARIANTS_PER_WORD, 48);
        assert_eq!(word_variations("secret").len(), 48);

        // One new word plus three defaults, no overlap between them
        let set = build_word_variations(&["secret"]);
        assert_eq!(set.variants.len(), 4 * 48);

        // Repeating a default adds nothing
        let set = build_word_variations(&["apple", "APPLE"]);
        assert_eq!(set.variants.len(), 3 * 48);
    }

    #[test]
    fn test_input_not_mutated() {
        let words = vec!["secret".to_string()];
        let _ = build_word_variations(&words);
        assert_eq!(words, vec!["secret".to_string()]);
    }

    #[test]
    fn test_blank_words_skipped() {
        let set = build_word_variations(&["", "   "]);
        assert_eq!(set.variants.len(), 3 * 48);
        assert!(!set.contains("s"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("hELLO"), "Hello");
        assert_eq!(capitalize("x"), "X");
        assert_eq!(capitalize(""), "");
    }
}
