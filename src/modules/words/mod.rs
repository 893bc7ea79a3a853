//! Learning store: the persistent corpus of confirmed words and the Roman
//! patterns that resolve to them.
//!
//! A separate SQLite file from the scheme, opened read-write with
//! write-ahead logging so concurrent handles writing the same corpus
//! serialise instead of corrupting. Words are unique; re-learning bumps a
//! confidence counter that ranks suggestions. Every pattern row points at a
//! word and carries a `learned` flag: true when the pattern was a full
//! tokenization of a confirmed word, false when it is only a prefix kept
//! for autocomplete.

use std::cell::RefCell;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, warn};

use crate::modules::core::{Suggestion, MIN_SUGGESTION_LENGTH};
use crate::modules::symbols::tokenizer::flatten_first;
use crate::modules::symbols::{LookupMode, MatchFilter, SymbolStore, SymbolStoreError, Token};

pub mod export;

pub use export::{ExportedPattern, ExportedWord};

/// Words-table matches considered per segment in the fallback tokenizer.
const MATCHES_PER_SEGMENT: usize = 3;

/// Candidate paths the fallback tokenizer will fan out to.
const MAX_CANDIDATE_PATHS: usize = 5;

#[derive(Error, Debug)]
pub enum WordStoreError {
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error(transparent)]
    Symbols(#[from] SymbolStoreError),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed export file: {0}")]
    MalformedExport(#[from] serde_json::Error),
    #[error("word '{0}' is not known")]
    UnknownWord(String),
}

pub struct LearningStore {
    conn: Connection,
    // Learning enumerates many patterns for one word in a row; remembering
    // the last learned (word, id) short-circuits the repeated lookups.
    last_learned: RefCell<Option<(String, i64)>>,
}

impl LearningStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WordStoreError> {
        let conn = Connection::open(path)?;
        conn.set_prepared_statement_cache_capacity(32);
        conn.execute_batch("pragma page_size=4096;")?;
        // Setting the journal mode reports the resulting mode as a row.
        let _mode: String = conn.query_row("pragma journal_mode=wal", [], |row| row.get(0))?;
        conn.execute_batch(
            "create table if not exists metadata (key TEXT UNIQUE, value TEXT);
             create table if not exists words (
                 id INTEGER PRIMARY KEY,
                 word TEXT UNIQUE,
                 confidence INTEGER DEFAULT 1,
                 learned_on INTEGER);
             create table if not exists patterns (
                 pattern TEXT,
                 word_id INTEGER,
                 learned INTEGER DEFAULT 0,
                 PRIMARY KEY(pattern, word_id)) without rowid;",
        )?;
        Ok(LearningStore {
            conn,
            last_learned: RefCell::new(None),
        })
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn begin(&self) -> Result<(), WordStoreError> {
        self.conn.execute_batch("BEGIN;")?;
        Ok(())
    }

    pub fn commit(&self) -> Result<(), WordStoreError> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    /// Rollback failures are logged and swallowed; the root cause of the
    /// rollback is the error worth surfacing.
    pub fn rollback(&self) {
        if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
            warn!(error = %err, "rollback of learning store changes failed");
        }
    }

    /// Insert-or-ignore. Returns the fresh id, or `None` when the word was
    /// already present.
    pub fn try_insert_word(
        &self,
        word: &str,
        confidence: i64,
    ) -> Result<Option<i64>, WordStoreError> {
        let mut stmt = self.conn.prepare_cached(
            "insert or ignore into words (word, confidence, learned_on)
             values (trim(?1), ?2, strftime('%s', 'now'))",
        )?;
        stmt.execute(params![word, confidence])?;
        if self.conn.changes() > 0 {
            Ok(Some(self.conn.last_insert_rowid()))
        } else {
            Ok(None)
        }
    }

    /// Adds one to an existing word's confidence. Returns whether a row
    /// was touched.
    pub fn bump_confidence(&self, word: &str) -> Result<bool, WordStoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("update words set confidence = confidence + 1 where word = ?1")?;
        stmt.execute(params![word])?;
        Ok(self.conn.changes() > 0)
    }

    /// Re-learn bump with insert fallback. Returns the word's id either way.
    pub fn learn_word(&self, word: &str, confidence: i64) -> Result<i64, WordStoreError> {
        if self.bump_confidence(word)? {
            return self
                .get_word_id(word)?
                .ok_or_else(|| WordStoreError::UnknownWord(word.to_string()));
        }
        match self.try_insert_word(word, confidence)? {
            Some(id) => {
                *self.last_learned.borrow_mut() = Some((word.to_string(), id));
                Ok(id)
            }
            // Lost a race against our own bump; the row exists now.
            None => self
                .get_word_id(word)?
                .ok_or_else(|| WordStoreError::UnknownWord(word.to_string())),
        }
    }

    pub fn get_word_id(&self, word: &str) -> Result<Option<i64>, WordStoreError> {
        if let Some((last_word, id)) = self.last_learned.borrow().as_ref() {
            if last_word == word {
                return Ok(Some(*id));
            }
        }
        let mut stmt = self
            .conn
            .prepare_cached("select id from words where word = ?1 limit 1")?;
        Ok(stmt.query_row(params![word], |row| row.get(0)).optional()?)
    }

    /// Stores one pattern row. Full-word patterns additionally set the
    /// learned flag, upgrading a row previously stored as a prefix.
    pub fn persist_pattern(
        &self,
        pattern: &str,
        word_id: i64,
        is_prefix: bool,
    ) -> Result<(), WordStoreError> {
        let mut insert = self.conn.prepare_cached(
            "insert or ignore into patterns (pattern, word_id) values (trim(lower(?1)), ?2)",
        )?;
        insert.execute(params![pattern, word_id])?;

        if !is_prefix {
            let mut upgrade = self.conn.prepare_cached(
                "update patterns set learned = 1
                 where pattern = trim(lower(?1)) and word_id = ?2 and learned = 0",
            )?;
            upgrade.execute(params![pattern, word_id])?;
        }
        Ok(())
    }

    /// Words whose pattern table contains `prefix` exactly.
    pub fn get_matches(&self, prefix: &str) -> Result<Vec<String>, WordStoreError> {
        let mut stmt = self.conn.prepare_cached(
            "select word from words where id in
               (select distinct(word_id) from patterns where pattern = lower(?1) limit ?2)",
        )?;
        let rows = stmt.query_map(params![prefix, MATCHES_PER_SEGMENT as i64], |row| row.get(0))?;
        let mut words = Vec::new();
        for row in rows {
            words.push(row?);
        }
        Ok(words)
    }

    /// Learned words whose full pattern equals `input`, best confidence
    /// first. Short inputs return nothing.
    pub fn get_best_match(&self, input: &str) -> Result<Vec<Suggestion>, WordStoreError> {
        if input.len() < MIN_SUGGESTION_LENGTH {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare_cached(
            "select word, confidence from words where id in
               (select word_id from patterns
                 where pattern = lower(?1) and learned = 1 limit 5)
             order by confidence desc",
        )?;
        self.collect_suggestions(&mut stmt, input)
    }

    /// Learned words reachable by extending `input`, best confidence first.
    pub fn get_suggestions(&self, input: &str) -> Result<Vec<Suggestion>, WordStoreError> {
        if input.len() < MIN_SUGGESTION_LENGTH {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare_cached(
            "select word, confidence from words where id in
               (select distinct(word_id) from patterns
                 where pattern > lower(?1) and pattern <= lower(?1) || 'z' and learned = 1
                 limit 5)
             order by confidence desc",
        )?;
        self.collect_suggestions(&mut stmt, input)
    }

    fn collect_suggestions(
        &self,
        stmt: &mut rusqlite::CachedStatement<'_>,
        input: &str,
    ) -> Result<Vec<Suggestion>, WordStoreError> {
        let rows = stmt.query_map(params![input], |row| {
            Ok(Suggestion {
                text: row.get(0)?,
                confidence: row.get(1)?,
            })
        })?;
        let mut suggestions = Vec::new();
        for row in rows {
            suggestions.push(row?);
        }
        Ok(suggestions)
    }

    /// Existence probe for the suggestion range; lets prefix walks stop
    /// early.
    pub fn possible_to_find_matches(&self, prefix: &str) -> Result<bool, WordStoreError> {
        let mut stmt = self.conn.prepare_cached(
            "select exists(select 1 from patterns
               where pattern > lower(?1) and pattern <= lower(?1) || 'z')",
        )?;
        Ok(stmt.query_row(params![prefix], |row| row.get(0))?)
    }

    /// Removes the word and every pattern pointing at it, atomically.
    /// Unknown words are a no-op.
    pub fn delete_word(&self, word: &str) -> Result<(), WordStoreError> {
        let Some(word_id) = self.get_word_id(word)? else {
            return Ok(());
        };

        self.begin()?;
        let result = (|| -> Result<(), WordStoreError> {
            self.conn
                .prepare_cached("delete from patterns where word_id = ?1")?
                .execute(params![word_id])?;
            self.conn
                .prepare_cached("delete from words where id = ?1")?
                .execute(params![word_id])?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.commit()?;
                let mut memo = self.last_learned.borrow_mut();
                if memo.as_ref().is_some_and(|(w, _)| w == word) {
                    *memo = None;
                }
                Ok(())
            }
            Err(err) => {
                self.rollback();
                Err(err)
            }
        }
    }

    pub fn is_known_word(&self, word: &str) -> Result<bool, WordStoreError> {
        Ok(self.get_word_id(word)?.is_some())
    }

    pub fn words_count(&self, only_learned: bool) -> Result<i64, WordStoreError> {
        let sql = if only_learned {
            "select count(distinct(word_id)) from patterns where learned = 1"
        } else {
            "select count(id) from words"
        };
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(stmt.query_row([], |row| row.get(0))?)
    }

    /// Compacts the store file.
    pub fn compact(&self) -> Result<(), WordStoreError> {
        debug!("compacting learning store");
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    /// Tokenizes Roman input against the words table instead of the symbol
    /// store: the longest stored pattern matching a prefix of the input
    /// contributes its words, and spans no stored pattern covers fall back
    /// to symbol tokenization. Returns candidate token paths; empty when
    /// the words table never matched.
    pub fn tokenize_via_words(
        &self,
        symbols: &SymbolStore,
        input: &str,
    ) -> Result<Vec<Vec<Token>>, WordStoreError> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        debug!(input, "tokenizing against the words table");

        let mut paths: Vec<Vec<Token>> = vec![Vec::new()];
        let mut any_word_match = false;
        let mut deferred = String::new();
        let mut rest = input;

        while !rest.is_empty() {
            let mut lookup = String::new();
            let mut match_len = 0usize;
            let mut matched_words: Vec<String> = Vec::new();

            for ch in rest.chars() {
                lookup.push(ch);
                let words = self.get_matches(&lookup)?;
                if !words.is_empty() {
                    match_len = lookup.len();
                    matched_words = words;
                }
                if !self.possible_to_find_matches(&lookup)? {
                    break;
                }
            }

            if match_len == 0 {
                // This span is unknown to the words table; hand it to the
                // symbol tokenizer once a match resumes or input ends.
                let ch = rest.chars().next().expect("rest is non-empty");
                deferred.push(ch);
                rest = &rest[ch.len_utf8()..];
                continue;
            }

            any_word_match = true;
            self.flush_deferred(symbols, &mut deferred, &mut paths)?;

            let mut segment: Vec<Vec<Token>> = Vec::new();
            for word in &matched_words {
                let groups = symbols.tokenize(word, LookupMode::Value, MatchFilter::Exact)?;
                segment.push(flatten_first(&groups));
            }
            paths = cross_extend(paths, &segment);

            rest = &rest[match_len..];
        }

        self.flush_deferred(symbols, &mut deferred, &mut paths)?;

        if !any_word_match {
            return Ok(Vec::new());
        }
        Ok(paths)
    }

    fn flush_deferred(
        &self,
        symbols: &SymbolStore,
        deferred: &mut String,
        paths: &mut [Vec<Token>],
    ) -> Result<(), WordStoreError> {
        if deferred.is_empty() {
            return Ok(());
        }
        let groups = symbols.tokenize(deferred, LookupMode::Pattern, MatchFilter::Exact)?;
        let flat = flatten_first(&groups);
        for path in paths.iter_mut() {
            path.extend(flat.iter().cloned());
        }
        deferred.clear();
        Ok(())
    }
}

fn cross_extend(paths: Vec<Vec<Token>>, segment: &[Vec<Token>]) -> Vec<Vec<Token>> {
    if segment.is_empty() {
        return paths;
    }
    let mut out = Vec::new();
    'outer: for path in &paths {
        for tokens in segment {
            let mut extended = path.clone();
            extended.extend(tokens.iter().cloned());
            out.push(extended);
            if out.len() == MAX_CANDIDATE_PATHS {
                break 'outer;
            }
        }
    }
    out
}
