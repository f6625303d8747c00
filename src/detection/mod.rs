//! Sensitive text detection
//!
//! Decides which OCR tokens must be redacted. A session runs in exactly one
//! mode: exact word matching against a canonical word set, or privacy mode
//! matching against the built-in sensitive-data patterns.

pub mod patterns;
pub mod words;

use tracing::debug;

use patterns::{compile_sensitive_patterns, CompiledPatternSet};
use words::{build_word_variations, CanonicalWordSet};

use crate::vision::{DetectionBox, OcrToken};

/// Matching policy selected once per session
#[derive(Debug, Clone)]
pub enum MatchMode {
    /// Token text (lowercased) must be in the word set
    Exact(CanonicalWordSet),
    /// Token text must start with a sensitive-data pattern match
    Privacy(CompiledPatternSet),
}

/// Filters OCR tokens down to the boxes that need redaction
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    mode: MatchMode,
}

impl TokenMatcher {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    /// Exact mode over the given user words (defaults included)
    pub fn exact<S: AsRef<str>>(words: &[S]) -> Self {
        Self::new(MatchMode::Exact(build_word_variations(words)))
    }

    /// Privacy mode over the built-in patterns
    pub fn privacy() -> Self {
        Self::new(MatchMode::Privacy(compile_sensitive_patterns()))
    }

    pub fn is_privacy_mode(&self) -> bool {
        matches!(self.mode, MatchMode::Privacy(_))
    }

    /// Whether a single token must be redacted.
    ///
    /// Tokens with confidence <= 0 never match.
    pub fn is_match(&self, token: &OcrToken) -> bool {
        if token.confidence <= 0 {
            return false;
        }
        match &self.mode {
            MatchMode::Exact(words) => words.contains(&token.text.to_lowercase()),
            MatchMode::Privacy(patterns) => match patterns.first_match(&token.text) {
                Some(pattern) => {
                    debug!(
                        "Privacy match ({}, {:?}) at ({}, {}) {}x{}",
                        pattern.name,
                        pattern.category,
                        token.bounds.x,
                        token.bounds.y,
                        token.bounds.width,
                        token.bounds.height
                    );
                    true
                }
                None => false,
            },
        }
    }

    /// Boxes of all matching tokens, in OCR scan order
    pub fn match_tokens(&self, tokens: &[OcrToken]) -> Vec<DetectionBox> {
        tokens
            .iter()
            .filter(|token| self.is_match(token))
            .map(|token| token.bounds)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, confidence: i32, x: u32) -> OcrToken {
        OcrToken::new(text, confidence, DetectionBox::new(x, 10, 40, 12))
    }

    #[test]
    fn test_exact_mode_matches_lowercased_text() {
        let matcher = TokenMatcher::exact(&["secret"]);
        assert!(matcher.is_match(&token("secret", 90, 0)));
        assert!(matcher.is_match(&token("SECRETS!", 90, 0)));
        assert!(matcher.is_match(&token("Password,", 90, 0)));
        assert!(!matcher.is_match(&token("secretary", 90, 0)));
    }

    #[test]
    fn test_exact_mode_never_matches_low_confidence() {
        let matcher = TokenMatcher::exact(&["secret"]);
        for text in ["secret", "password", "apple", "", "anything"] {
            assert!(!matcher.is_match(&token(text, 0, 0)), "{}", text);
            assert!(!matcher.is_match(&token(text, -1, 0)), "{}", text);
        }
    }

    #[test]
    fn test_privacy_mode() {
        let matcher = TokenMatcher::privacy();
        assert!(matcher.is_privacy_mode());
        assert!(matcher.is_match(&token("555-123-4567", 80, 0)));
        assert!(matcher.is_match(&token("123-45-6789", 80, 0)));
        assert!(matcher.is_match(&token("192.168.0.10", 80, 0)));
        assert!(!matcher.is_match(&token("555-123-4567", -1, 0)));

        // Word list is not consulted in privacy mode
        assert!(!matcher.is_match(&token("password", 95, 0)));
    }

    #[test]
    fn test_match_tokens_preserves_scan_order() {
        let matcher = TokenMatcher::exact(&["secret"]);
        let tokens = vec![
            token("banana", 70, 300),
            token("hello", 90, 100),
            token("", -1, 0),
            token("Secret", 85, 50),
            token("apple", 0, 200),
        ];

        let boxes = matcher.match_tokens(&tokens);
        assert_eq!(
            boxes,
            vec![DetectionBox::new(300, 10, 40, 12), DetectionBox::new(50, 10, 40, 12)]
        );
    }
}
