//! The learner: turns a confirmed script word into stored patterns.
//!
//! A word is value-tokenized against the scheme with every accepted
//! alternative included, validated for learnability, then every Cartesian
//! product of the candidate groups becomes a full pattern and every strict
//! prefix of every product becomes a prefix pattern for autocomplete. The
//! whole of one learn call commits atomically.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::modules::core::{LearnStatus, MAXIMUM_PATTERNS_TO_LEARN};
use crate::modules::renderer::{RenderError, Resolver};
use crate::modules::symbols::{
    LookupMode, MatchFilter, MatchType, SymbolStore, SymbolStoreError, Token, TokenKind,
};
use crate::modules::words::{LearningStore, WordStoreError};

#[derive(Error, Debug)]
pub enum LearnError {
    #[error("the learning store is not enabled")]
    StoreNotEnabled,
    #[error("nothing to learn from '{0}'")]
    NothingToLearn(String),
    #[error("word contains only vowels; nothing to learn from '{0}'")]
    OnlyVowels(String),
    #[error("cannot process '{pattern}': one or more characters in '{word}' are not known")]
    UnknownCharacters { pattern: String, word: String },
    #[error("'{0}' looks incorrect; not learning anything")]
    LooksIncorrect(String),
    #[error(transparent)]
    Symbols(#[from] SymbolStoreError),
    #[error(transparent)]
    Words(#[from] WordStoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

static SPECIAL_CHARACTERS: Lazy<FxHashSet<char>> = Lazy::new(|| {
    [
        '\n', '\t', '\r', ',', '.', '/', '<', '>', '?', ';', '\'', ':', '"', '[', ']', '{', '}',
        '~', '`', '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '-', '_', '+', '=', '\\',
        '|', ' ',
    ]
    .into_iter()
    .collect()
});

pub fn is_special_character(c: char) -> bool {
    SPECIAL_CHARACTERS.contains(&c)
}

/// NFC-normalizes and strips leading and trailing special characters.
pub fn sanitize_word(word: &str) -> String {
    let normalized: String = word.nfc().collect();
    normalized.trim_matches(is_special_character).to_string()
}

/// The sanity gate in front of learning. Single-token inputs teach
/// nothing, all-vowel inputs are noise, unknown graphemes mean the scheme
/// cannot express the word, and long runs of one token are keyboard mash.
pub fn can_learn_from_tokens(groups: &[Vec<Token>], word: &str) -> Result<(), LearnError> {
    if groups.len() < 2 {
        return Err(LearnError::NothingToLearn(word.to_string()));
    }

    let mut all_vowels = true;
    let mut last_token_id = None;
    let mut run = 0usize;

    for group in groups {
        for token in group {
            if token.match_type == MatchType::Possibility {
                continue;
            }
            if token.kind != TokenKind::Vowel {
                all_vowels = false;
            }
            if token.kind == TokenKind::Other {
                return Err(LearnError::UnknownCharacters {
                    pattern: token.pattern.clone(),
                    word: word.to_string(),
                });
            }
            if last_token_id == Some(token.id) {
                run += 1;
            } else {
                run = 1;
                last_token_id = Some(token.id);
            }
            if run >= 3 {
                return Err(LearnError::LooksIncorrect(word.to_string()));
            }
        }
    }

    if all_vowels {
        return Err(LearnError::OnlyVowels(word.to_string()));
    }
    Ok(())
}

/// Learns one word. Returns the sanitized form that was stored.
pub fn learn(
    symbols: &SymbolStore,
    store: &LearningStore,
    resolver: &Resolver<'_>,
    word: &str,
    confidence: i64,
) -> Result<String, LearnError> {
    let sanitized = sanitize_word(word);
    if sanitized.is_empty() {
        return Err(LearnError::NothingToLearn(word.to_string()));
    }

    let groups = symbols.tokenize(&sanitized, LookupMode::Value, MatchFilter::All)?;
    can_learn_from_tokens(&groups, &sanitized)?;

    debug!(word = %sanitized, groups = groups.len(), "learning");

    store.begin()?;
    let result = (|| -> Result<(), LearnError> {
        store.learn_word(&sanitized, confidence)?;
        learn_all_possibilities(store, resolver, &groups, &sanitized)
    })();

    match result {
        Ok(()) => {
            store.commit()?;
            Ok(sanitized)
        }
        Err(err) => {
            store.rollback();
            Err(err)
        }
    }
}

/// Walks the Cartesian product of the candidate groups, rightmost group
/// varying fastest, learning each product and its prefixes. Capped at
/// [`MAXIMUM_PATTERNS_TO_LEARN`] products.
fn learn_all_possibilities(
    store: &LearningStore,
    resolver: &Resolver<'_>,
    groups: &[Vec<Token>],
    word: &str,
) -> Result<(), LearnError> {
    let mut offsets = vec![0usize; groups.len()];
    let mut word_already_learned = false;
    let mut total = 0usize;

    loop {
        let product: Vec<Token> = groups
            .iter()
            .zip(&offsets)
            .map(|(group, &offset)| group[offset].clone())
            .collect();

        learn_pattern(store, &product, word, false)?;
        learn_prefixes(store, resolver, &product, word_already_learned)?;
        word_already_learned = true;

        total += 1;
        if total == MAXIMUM_PATTERNS_TO_LEARN {
            return Ok(());
        }

        let mut idx = groups.len() - 1;
        loop {
            offsets[idx] += 1;
            if offsets[idx] < groups[idx].len() {
                break;
            }
            offsets[idx] = 0;
            if idx == 0 {
                return Ok(());
            }
            idx -= 1;
        }
    }
}

/// Concatenates the product's patterns, joiners excluded, and stores the
/// row against the word.
fn learn_pattern(
    store: &LearningStore,
    tokens: &[Token],
    word: &str,
    is_prefix: bool,
) -> Result<(), LearnError> {
    let word_id = store
        .get_word_id(word)?
        .ok_or_else(|| WordStoreError::UnknownWord(word.to_string()))?;

    let mut pattern = String::new();
    for token in tokens {
        if !token.kind.is_joiner() {
            pattern.push_str(&token.pattern);
        }
    }

    store.persist_pattern(&pattern, word_id, is_prefix)?;
    Ok(())
}

/// Learns every strict prefix of the product, lengths 2 through n-1. The
/// first product also learns each prefix's rendered text as a word of its
/// own, so sub-words autocomplete.
fn learn_prefixes(
    store: &LearningStore,
    resolver: &Resolver<'_>,
    product: &[Token],
    word_already_learned: bool,
) -> Result<(), LearnError> {
    for len in 2..product.len() {
        let prefix = &product[..len];
        let text = resolver.resolve(prefix)?;
        if text.is_empty() {
            continue;
        }
        if !word_already_learned {
            store.learn_word(&text, 1)?;
        }
        learn_pattern(store, prefix, &text, true)?;
    }
    Ok(())
}

/// Associates an explicit pattern with a word, learning the word first.
/// The word must still be expressible in the scheme.
pub fn train(
    symbols: &SymbolStore,
    store: &LearningStore,
    pattern: &str,
    word: &str,
) -> Result<(), LearnError> {
    let sanitized = sanitize_word(word);
    if sanitized.is_empty() {
        return Err(LearnError::NothingToLearn(word.to_string()));
    }

    let groups = symbols.tokenize(&sanitized, LookupMode::Value, MatchFilter::All)?;
    for group in &groups {
        for token in group {
            if token.kind == TokenKind::Other {
                return Err(LearnError::UnknownCharacters {
                    pattern: token.pattern.clone(),
                    word: sanitized,
                });
            }
        }
    }

    store.begin()?;
    let result = (|| -> Result<(), LearnError> {
        let word_id = store.learn_word(&sanitized, 1)?;
        store.persist_pattern(pattern, word_id, false)?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            store.commit()?;
            Ok(())
        }
        Err(err) => {
            store.rollback();
            Err(err)
        }
    }
}

/// Learns one word per line from a text file. Lines may carry a trailing
/// confidence. Each line commits or fails alone; the callback hears about
/// every line.
pub fn learn_from_file(
    symbols: &SymbolStore,
    store: &LearningStore,
    resolver: &Resolver<'_>,
    path: impl AsRef<Path>,
    mut callback: Option<&mut dyn FnMut(&str, Option<&LearnError>)>,
) -> Result<LearnStatus, LearnError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut status = LearnStatus::default();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (word, confidence) = split_word_confidence(trimmed);
        let result = learn(symbols, store, resolver, word, confidence);

        status.total += 1;
        match &result {
            Ok(_) => {
                if let Some(callback) = callback.as_mut() {
                    callback(word, None);
                }
            }
            Err(err) => {
                status.failed += 1;
                if let Some(callback) = callback.as_mut() {
                    callback(word, Some(err));
                }
            }
        }
    }

    Ok(status)
}

fn split_word_confidence(line: &str) -> (&str, i64) {
    if let Some((word, suffix)) = line.rsplit_once(char::is_whitespace) {
        if let Ok(confidence) = suffix.parse::<i64>() {
            if confidence > 0 {
                return (word.trim_end(), confidence);
            }
        }
    }
    (line, 1)
}
