//! Sensitive-data patterns used in privacy mode
//!
//! The set is fixed: two phone number forms, one SSN form and three IP
//! address forms, compiled once per session in a stable order.

use regex::Regex;
use tracing::{debug, error};

use crate::error::SentryError;

/// Category of sensitive data a pattern detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternCategory {
    Phone,
    Ssn,
    Ipv4,
    Ipv6,
}

/// Source definition of one pattern
#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    pub name: &'static str,
    pub category: PatternCategory,
    pub source: &'static str,
    /// Characters that may not directly follow the match
    pub not_followed_by: Option<&'static [char]>,
}

/// Built-in patterns, in match order
pub const SENSITIVE_PATTERNS: [PatternSpec; 6] = [
    // 123-456-7890, 123.456.7890, 123 456 7890
    PatternSpec {
        name: "phone",
        category: PatternCategory::Phone,
        source: r"\b\d{3}[-.\s]?\d{3}[-.\s]?\d{4}\b",
        not_followed_by: None,
    },
    // (123) 456-7890, (123)4567890
    PatternSpec {
        name: "phone_area_code",
        category: PatternCategory::Phone,
        source: r"\(\d{3}\)\s*\d{3}[-.\s]?\d{4}\b",
        not_followed_by: None,
    },
    // 123-45-6789, 123.45.6789, 123 45 6789
    PatternSpec {
        name: "ssn",
        category: PatternCategory::Ssn,
        source: r"\b\d{3}[-.\s]?\d{2}[-.\s]?\d{4}\b",
        not_followed_by: None,
    },
    PatternSpec {
        name: "ipv4",
        category: PatternCategory::Ipv4,
        source: r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
        not_followed_by: None,
    },
    // The regex engine has no lookahead; the trailing guard rejects a match
    // that runs straight into another digit or dot.
    PatternSpec {
        name: "ipv4_strict",
        category: PatternCategory::Ipv4,
        source: r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
        not_followed_by: Some(&['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.']),
    },
    PatternSpec {
        name: "ipv6",
        category: PatternCategory::Ipv6,
        source: r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b",
        not_followed_by: None,
    },
];

/// A compiled pattern, matched from the first character of a token
#[derive(Debug, Clone)]
pub struct SensitivePattern {
    pub name: &'static str,
    pub category: PatternCategory,
    regex: Regex,
    not_followed_by: Option<&'static [char]>,
}

impl SensitivePattern {
    /// Compile a pattern anchored at the start of the input
    pub fn compile(spec: &PatternSpec) -> Result<Self, SentryError> {
        let regex = Regex::new(&format!("^(?:{})", spec.source)).map_err(|source| {
            SentryError::PatternCompile {
                name: spec.name,
                source,
            }
        })?;
        Ok(Self {
            name: spec.name,
            category: spec.category,
            regex,
            not_followed_by: spec.not_followed_by,
        })
    }

    /// Whether the pattern matches starting at the first character.
    ///
    /// This is a prefix match: trailing text after the match is allowed.
    pub fn matches_prefix(&self, text: &str) -> bool {
        let Some(m) = self.regex.find(text) else {
            return false;
        };
        match self.not_followed_by {
            Some(forbidden) => text[m.end()..]
                .chars()
                .next()
                .map_or(true, |next| !forbidden.contains(&next)),
            None => true,
        }
    }
}

/// Ordered, immutable set of compiled patterns
#[derive(Debug, Clone, Default)]
pub struct CompiledPatternSet {
    patterns: Vec<SensitivePattern>,
}

impl CompiledPatternSet {
    /// First pattern matching the text, in set order
    pub fn first_match(&self, text: &str) -> Option<&SensitivePattern> {
        self.patterns.iter().find(|p| p.matches_prefix(text))
    }
}

/// Compile the built-in sensitive-data patterns
pub fn compile_sensitive_patterns() -> CompiledPatternSet {
    compile_patterns(&SENSITIVE_PATTERNS)
}

/// Compile pattern specs, excluding (and logging) any that fail
pub fn compile_patterns(specs: &[PatternSpec]) -> CompiledPatternSet {
    let mut patterns = Vec::with_capacity(specs.len());
    for spec in specs {
        match SensitivePattern::compile(spec) {
            Ok(pattern) => patterns.push(pattern),
            Err(e) => error!("Excluding sensitive pattern: {}", e),
        }
    }
    debug!("Compiled {}/{} sensitive patterns", patterns.len(), specs.len());
    CompiledPatternSet { patterns }
}
