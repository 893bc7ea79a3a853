//! Symbol-store row model.
//!
//! The integer values behind [`TokenKind`] and [`MatchType`] are persisted
//! inside scheme files and form a stable ABI. Do not renumber them.

/// Classification of a symbol-store row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum TokenKind {
    Vowel = 1,
    Consonant = 2,
    DeadConsonant = 3,
    ConsonantVowel = 4,
    Number = 5,
    Symbol = 6,
    Anusvara = 7,
    Visarga = 8,
    Virama = 9,
    Other = 10,
    NonJoiner = 11,
    Joiner = 12,
}

impl TokenKind {
    pub fn from_stored(value: i64) -> Option<Self> {
        Some(match value {
            1 => TokenKind::Vowel,
            2 => TokenKind::Consonant,
            3 => TokenKind::DeadConsonant,
            4 => TokenKind::ConsonantVowel,
            5 => TokenKind::Number,
            6 => TokenKind::Symbol,
            7 => TokenKind::Anusvara,
            8 => TokenKind::Visarga,
            9 => TokenKind::Virama,
            10 => TokenKind::Other,
            11 => TokenKind::NonJoiner,
            12 => TokenKind::Joiner,
            _ => return None,
        })
    }

    pub fn as_stored(self) -> i64 {
        self as i64
    }

    /// Joiner control tokens are invisible to learned patterns.
    pub fn is_joiner(self) -> bool {
        matches!(self, TokenKind::NonJoiner | TokenKind::Joiner)
    }
}

/// Whether a row is the canonical transliteration for its pattern or one of
/// several accepted alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum MatchType {
    Exact = 1,
    Possibility = 2,
}

impl MatchType {
    pub fn from_stored(value: i64) -> Option<Self> {
        match value {
            1 => Some(MatchType::Exact),
            2 => Some(MatchType::Possibility),
            _ => None,
        }
    }

    pub fn as_stored(self) -> i64 {
        self as i64
    }
}

/// Row id assigned to synthetic tokens that never touch the store.
pub const SYNTHETIC_TOKEN_ID: i64 = -99;

/// Bit set when another symbol's pattern strictly extends this pattern.
pub const FLAG_MORE_MATCHES_FOR_PATTERN: u32 = 1;
/// Bit set when another symbol's value strictly extends this value.
pub const FLAG_MORE_MATCHES_FOR_VALUE: u32 = 2;

/// One transliteration rule.
///
/// `value1` is the primary output. For vowels, `value2` carries the
/// dependent (matra) form and `value1` the independent form. `value3` is
/// auxiliary output some schemes define. Rows are immutable once persisted;
/// identity is (pattern, value1, match_type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: i64,
    pub kind: TokenKind,
    pub match_type: MatchType,
    pub pattern: String,
    pub value1: String,
    pub value2: String,
    pub value3: String,
    pub tag: String,
    pub priority: i64,
    pub accept_condition: i64,
    pub flags: u32,
}

impl Token {
    /// Synthesises the passthrough token the tokenizer emits for an input
    /// span no symbol matches. Pattern and value are the span itself.
    pub fn other(lookup: &str) -> Self {
        Token {
            id: SYNTHETIC_TOKEN_ID,
            kind: TokenKind::Other,
            match_type: MatchType::Exact,
            pattern: lookup.to_string(),
            value1: lookup.to_string(),
            value2: String::new(),
            value3: String::new(),
            tag: String::new(),
            priority: 0,
            accept_condition: 0,
            flags: 0,
        }
    }

    pub fn has_more_pattern_matches(&self) -> bool {
        self.flags & FLAG_MORE_MATCHES_FOR_PATTERN != 0
    }

    pub fn has_more_value_matches(&self) -> bool {
        self.flags & FLAG_MORE_MATCHES_FOR_VALUE != 0
    }
}
