//! Shared types and constants used across the engine modules.

use serde::{Deserialize, Serialize};

/// Zero-width non-joiner (U+200C). Appended after a virama to force an
/// explicit cluster break.
pub const ZWNJ: &str = "\u{200C}";

/// Zero-width joiner (U+200D).
pub const ZWJ: &str = "\u{200D}";

/// Longest pattern or value a symbol may carry, in bytes.
pub const SYMBOL_MAX: usize = 30;

/// Hard cap on the number of Cartesian products learned per word.
pub const MAXIMUM_PATTERNS_TO_LEARN: usize = 32;

/// Inputs shorter than this (in bytes) never reach the suggestion queries.
pub const MIN_SUGGESTION_LENGTH: usize = 3;

/// A ranked transliteration candidate.
///
/// Literal renderings and word-store recursion results carry confidence 1;
/// learned words carry their stored confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub confidence: i64,
}

impl Suggestion {
    pub fn new(text: impl Into<String>, confidence: i64) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Scheme metadata stored under the fixed metadata keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemeDetails {
    /// ISO 639-1 two letter code.
    pub language_code: String,
    pub identifier: String,
    pub display_name: String,
    pub author: String,
    pub compiled_date: String,
    pub is_stable: bool,
}

/// Aggregate outcome of a batch learn operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearnStatus {
    pub total: usize,
    pub failed: usize,
}

/// Word-corpus statistics for an open learning store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusDetails {
    pub words_count: i64,
    pub learned_words_count: i64,
}
