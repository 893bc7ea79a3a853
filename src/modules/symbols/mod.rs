//! Symbol store: the persistent table of transliteration rules backing one
//! scheme, plus the scheme metadata.
//!
//! The store is a single-file SQLite database (conventionally `.vst`).
//! Rules are interrogated through two orthogonal indexes, by Roman pattern
//! during forward transliteration and by script value during reverse
//! transliteration and learning. The hot lookups run through cached
//! prepared statements owned by the connection.

use std::cell::{Cell, RefCell};
use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::warn;

use crate::modules::core::{SchemeDetails, SYMBOL_MAX};

pub mod token;
pub mod tokenizer;

pub use token::{MatchType, Token, TokenKind};
pub use tokenizer::{LookupMode, MatchFilter};

pub const METADATA_LANGUAGE_CODE: &str = "lang-code";
pub const METADATA_IDENTIFIER: &str = "scheme-id";
pub const METADATA_DISPLAY_NAME: &str = "scheme-display-name";
pub const METADATA_AUTHOR: &str = "scheme-author";
pub const METADATA_COMPILED_DATE: &str = "scheme-compiled-date";
pub const METADATA_STABLE: &str = "scheme-stable";

#[derive(Error, Debug)]
pub enum SymbolStoreError {
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("there is already a match available for '{pattern} => {value1}'; duplicate entries are not allowed")]
    DuplicateToken { pattern: String, value1: String },
    #[error("pattern, value or tag longer than {SYMBOL_MAX} bytes: '{0}'")]
    FieldTooLong(String),
    #[error("a virama must be defined before {0}")]
    ViramaRequired(&'static str),
    #[error("language code should be an ISO 639-1 two letter code, got '{0}'")]
    BadLanguageCode(String),
}

/// Per-call knobs the handle threads into token persistence.
#[derive(Debug, Clone, Copy)]
pub struct PersistOptions {
    pub use_dead_consonants: bool,
    pub ignore_duplicates: bool,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            use_dead_consonants: true,
            ignore_duplicates: false,
        }
    }
}

pub struct SymbolStore {
    conn: Connection,
    virama: RefCell<Option<Token>>,
    flags_stamped: Cell<bool>,
    buffering: Cell<bool>,
}

impl SymbolStore {
    /// Opens a scheme file, creating the schema when absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SymbolStoreError> {
        let conn = Connection::open(path)?;
        conn.set_prepared_statement_cache_capacity(32);
        let store = SymbolStore {
            conn,
            virama: RefCell::new(None),
            flags_stamped: Cell::new(false),
            buffering: Cell::new(false),
        };
        store.ensure_schema()?;
        store.refresh_flags_stamped()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), SymbolStoreError> {
        self.conn.execute_batch(
            "pragma page_size=4096;
             create table if not exists metadata (key TEXT UNIQUE, value TEXT);
             create table if not exists symbols (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 type INTEGER, pattern TEXT, value1 TEXT, value2 TEXT, value3 TEXT,
                 tag TEXT, match_type INTEGER,
                 priority INTEGER DEFAULT 0,
                 accept_condition INTEGER DEFAULT 0,
                 flags INTEGER DEFAULT 0);
             create index if not exists index_metadata on metadata (key);
             create index if not exists index_pattern on symbols (pattern);
             create index if not exists index_value1 on symbols (value1);
             create index if not exists index_value2 on symbols (value2);
             create index if not exists index_value3 on symbols (value3);",
        )?;
        Ok(())
    }

    fn refresh_flags_stamped(&self) -> Result<(), SymbolStoreError> {
        let stamped: bool = self.conn.query_row(
            "select exists(select 1 from symbols where flags != 0)",
            [],
            |row| row.get(0),
        )?;
        self.flags_stamped.set(stamped);
        Ok(())
    }

    pub(crate) fn flags_stamped(&self) -> bool {
        self.flags_stamped.get()
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Wraps subsequent writes in one transaction until [`flush_buffer`] or
    /// [`discard_buffer`]. Calling it twice is a no-op.
    ///
    /// [`flush_buffer`]: Self::flush_buffer
    /// [`discard_buffer`]: Self::discard_buffer
    pub fn start_buffering(&self) -> Result<(), SymbolStoreError> {
        if self.buffering.get() {
            return Ok(());
        }
        self.conn.execute_batch("BEGIN;")?;
        self.buffering.set(true);
        Ok(())
    }

    /// Commits buffered writes and compacts the file.
    pub fn flush_buffer(&self) -> Result<(), SymbolStoreError> {
        if !self.buffering.get() {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT;")?;
        self.buffering.set(false);
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    /// Rolls back buffered writes. Rollback failures are swallowed so they
    /// never mask the error that triggered the rollback.
    pub fn discard_buffer(&self) {
        if !self.buffering.get() {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
            warn!(error = %err, "rollback of buffered scheme changes failed");
        }
        self.buffering.set(false);
    }

    fn already_persisted(
        &self,
        pattern: &str,
        value1: &str,
        match_type: MatchType,
    ) -> Result<bool, SymbolStoreError> {
        let count: i64 = match match_type {
            MatchType::Exact => {
                let mut stmt = self.conn.prepare_cached(
                    "select count(1) from symbols where pattern = trim(?1) and match_type = ?2",
                )?;
                stmt.query_row(params![pattern, match_type.as_stored()], |row| row.get(0))?
            }
            MatchType::Possibility => {
                let mut stmt = self.conn.prepare_cached(
                    "select count(1) from symbols where pattern = trim(?1) and value1 = trim(?2)",
                )?;
                stmt.query_row(params![pattern, value1], |row| row.get(0))?
            }
        };
        Ok(count > 0)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_symbol(
        &self,
        kind: TokenKind,
        pattern: &str,
        value1: &str,
        value2: &str,
        value3: &str,
        tag: &str,
        match_type: MatchType,
        opts: PersistOptions,
    ) -> Result<(), SymbolStoreError> {
        if self.already_persisted(pattern, value1, match_type)? {
            if opts.ignore_duplicates {
                warn!(pattern, value1, "ignoring duplicate token");
                return Ok(());
            }
            return Err(SymbolStoreError::DuplicateToken {
                pattern: pattern.to_string(),
                value1: value1.to_string(),
            });
        }

        let mut stmt = self.conn.prepare_cached(
            "insert into symbols (type, pattern, value1, value2, value3, tag, match_type)
             values (?1, trim(?2), trim(?3), trim(?4), trim(?5), trim(?6), ?7)",
        )?;
        stmt.execute(params![
            kind.as_stored(),
            pattern,
            value1,
            value2,
            value3,
            tag,
            match_type.as_stored(),
        ])?;
        Ok(())
    }

    /// Persists one transliteration rule.
    ///
    /// With dead-consonant inference on, a consonant whose value already
    /// ends in the virama is stored as a dead consonant, and a consonant
    /// pattern carrying a trailing inherent `a` additionally produces the
    /// bare dead-consonant variant (`ka` also yields `k` plus virama).
    #[allow(clippy::too_many_arguments)]
    pub fn persist_token(
        &self,
        pattern: &str,
        value1: &str,
        value2: &str,
        value3: &str,
        tag: &str,
        kind: TokenKind,
        match_type: MatchType,
        opts: PersistOptions,
    ) -> Result<(), SymbolStoreError> {
        for field in [pattern, value1, value2, value3, tag] {
            if field.len() > SYMBOL_MAX {
                return Err(SymbolStoreError::FieldTooLong(field.to_string()));
            }
        }

        let mut kind = kind;
        if kind == TokenKind::Consonant && opts.use_dead_consonants {
            let virama = self
                .get_virama()?
                .ok_or(SymbolStoreError::ViramaRequired("inferring dead consonants"))?;

            if value1.ends_with(&virama.value1) {
                kind = TokenKind::DeadConsonant;
            } else if has_inherent_a(pattern) {
                let bare = &pattern[..pattern.len() - 1];
                let dead_value1 = format!("{}{}", value1, virama.value1);
                let dead_value2 = if value2.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", value2, virama.value1)
                };
                self.insert_symbol(
                    TokenKind::DeadConsonant,
                    bare,
                    &dead_value1,
                    &dead_value2,
                    "",
                    tag,
                    match_type,
                    opts,
                )?;
            }
        }

        let (value1, value2) = if kind == TokenKind::NonJoiner {
            // The renderer cancels conjunct formation by seeing empty
            // values and resetting its previous-token slot.
            ("", "")
        } else {
            (value1, value2)
        };

        self.insert_symbol(kind, pattern, value1, value2, value3, tag, match_type, opts)
    }

    /// Returns the unique exact virama, cached after the first read. Every
    /// render consults this.
    pub fn get_virama(&self) -> Result<Option<Token>, SymbolStoreError> {
        if let Some(tok) = self.virama.borrow().as_ref() {
            return Ok(Some(tok.clone()));
        }
        let mut stmt = self.conn.prepare_cached(
            "select id, type, match_type, pattern, value1, value2, value3, tag,
                    priority, accept_condition, flags
             from symbols where type = ?1 and match_type = ?2 limit 1",
        )?;
        let found = stmt
            .query_row(
                params![TokenKind::Virama.as_stored(), MatchType::Exact.as_stored()],
                token_from_row,
            )
            .optional()?;
        if let Some(tok) = &found {
            *self.virama.borrow_mut() = Some(tok.clone());
        }
        Ok(found)
    }

    /// Ordered scan of every token of one kind.
    pub fn get_all_tokens(&self, kind: TokenKind) -> Result<Vec<Token>, SymbolStoreError> {
        let mut stmt = self.conn.prepare_cached(
            "select id, type, match_type, pattern, value1, value2, value3, tag,
                    priority, accept_condition, flags
             from symbols where type = ?1 order by id",
        )?;
        let rows = stmt.query_map(params![kind.as_stored()], token_from_row)?;
        let mut tokens = Vec::new();
        for row in rows {
            tokens.push(row?);
        }
        Ok(tokens)
    }

    /// Synthesises a consonant-vowel token for every dead consonant and
    /// vowel pair, combining the bare consonant with the vowel's dependent
    /// form. Duplicates are skipped rather than erroring.
    pub fn generate_cv_combinations(&self) -> Result<(), SymbolStoreError> {
        let virama = self.get_virama()?.ok_or(SymbolStoreError::ViramaRequired(
            "generating consonant vowel combinations",
        ))?;

        let vowels = self.get_all_tokens(TokenKind::Vowel)?;
        let consonants = self.get_all_tokens(TokenKind::DeadConsonant)?;

        let opts = PersistOptions {
            use_dead_consonants: false,
            ignore_duplicates: true,
        };

        for consonant in &consonants {
            // Dead consonants carry a trailing virama in pattern and
            // values; strip it before appending the vowel.
            let cons_pattern = strip_end(&consonant.pattern, &virama.pattern);
            let cons_value1 = strip_end(&consonant.value1, &virama.value1);
            let cons_value2 = if consonant.value2.is_empty() {
                ""
            } else {
                strip_end(&consonant.value2, &virama.value1)
            };

            for vowel in &vowels {
                let pattern = format!("{}{}", cons_pattern, vowel.pattern);
                let (value1, value2) = if vowel.value2.is_empty() {
                    (cons_value1.to_string(), cons_value2.to_string())
                } else {
                    (
                        format!("{}{}", cons_value1, vowel.value2),
                        if cons_value2.is_empty() {
                            String::new()
                        } else {
                            format!("{}{}", cons_value2, vowel.value2)
                        },
                    )
                };

                let match_type = if consonant.match_type == MatchType::Possibility
                    || vowel.match_type == MatchType::Possibility
                {
                    MatchType::Possibility
                } else {
                    MatchType::Exact
                };

                if pattern.len() > SYMBOL_MAX || value1.len() > SYMBOL_MAX {
                    continue;
                }
                self.insert_symbol(
                    TokenKind::ConsonantVowel,
                    &pattern,
                    &value1,
                    &value2,
                    "",
                    "",
                    match_type,
                    opts,
                )?;
            }
        }
        Ok(())
    }

    /// One-shot scan stamping the two prefix-continuation bits on every
    /// row. Runs at scheme-build time; the tokenizer trusts the bits
    /// afterwards and skips its lookahead query.
    pub fn stamp_prefix_flags(&self) -> Result<(), SymbolStoreError> {
        self.conn.execute_batch(
            "update symbols set flags =
               (case when exists (select 1 from symbols s
                     where length(s.pattern) > length(symbols.pattern)
                       and substr(s.pattern, 1, length(symbols.pattern)) = symbols.pattern)
                then 1 else 0 end)
               |
               (case when symbols.value1 != '' and exists (select 1 from symbols s
                     where (length(s.value1) > length(symbols.value1)
                            and substr(s.value1, 1, length(symbols.value1)) = symbols.value1)
                        or (length(s.value2) > length(symbols.value1)
                            and substr(s.value2, 1, length(symbols.value1)) = symbols.value1)
                        or (symbols.value2 != '' and (
                               (length(s.value1) > length(symbols.value2)
                                and substr(s.value1, 1, length(symbols.value2)) = symbols.value2)
                            or (length(s.value2) > length(symbols.value2)
                                and substr(s.value2, 1, length(symbols.value2)) = symbols.value2))))
                then 2 else 0 end);",
        )?;
        self.refresh_flags_stamped()?;
        Ok(())
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<(), SymbolStoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("insert or replace into metadata (key, value) values (?1, ?2)")?;
        stmt.execute(params![key, value])?;
        Ok(())
    }

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>, SymbolStoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("select value from metadata where key = ?1")?;
        Ok(stmt.query_row(params![key], |row| row.get(0)).optional()?)
    }

    /// Stores the scheme descriptors under their fixed metadata keys.
    /// Empty fields are left untouched.
    pub fn set_scheme_details(&self, details: &SchemeDetails) -> Result<(), SymbolStoreError> {
        if !details.language_code.is_empty() {
            if details.language_code.chars().count() != 2 {
                return Err(SymbolStoreError::BadLanguageCode(
                    details.language_code.clone(),
                ));
            }
            self.set_metadata(METADATA_LANGUAGE_CODE, &details.language_code)?;
        }
        if !details.identifier.is_empty() {
            self.set_metadata(METADATA_IDENTIFIER, &details.identifier)?;
        }
        if !details.display_name.is_empty() {
            self.set_metadata(METADATA_DISPLAY_NAME, &details.display_name)?;
        }
        if !details.author.is_empty() {
            self.set_metadata(METADATA_AUTHOR, &details.author)?;
        }
        if !details.compiled_date.is_empty() {
            self.set_metadata(METADATA_COMPILED_DATE, &details.compiled_date)?;
        }
        self.set_metadata(METADATA_STABLE, if details.is_stable { "1" } else { "0" })?;
        Ok(())
    }

    pub fn get_scheme_details(&self) -> Result<SchemeDetails, SymbolStoreError> {
        let get = |key| -> Result<String, SymbolStoreError> {
            Ok(self.get_metadata(key)?.unwrap_or_default())
        };
        Ok(SchemeDetails {
            language_code: get(METADATA_LANGUAGE_CODE)?,
            identifier: get(METADATA_IDENTIFIER)?,
            display_name: get(METADATA_DISPLAY_NAME)?,
            author: get(METADATA_AUTHOR)?,
            compiled_date: get(METADATA_COMPILED_DATE)?,
            is_stable: get(METADATA_STABLE)? == "1",
        })
    }
}

/// True for patterns like `ka` whose trailing `a` is the inherent vowel.
/// Double `aa` endings are long vowels, not candidates.
fn has_inherent_a(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    bytes.len() > 1 && bytes[bytes.len() - 1] == b'a' && bytes[bytes.len() - 2] != b'a'
}

fn strip_end<'a>(value: &'a str, suffix: &str) -> &'a str {
    value.strip_suffix(suffix).unwrap_or(value)
}

pub(crate) fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    let raw_kind: i64 = row.get(1)?;
    let raw_match: i64 = row.get(2)?;
    let kind = TokenKind::from_stored(raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Integer,
            format!("unknown token kind {raw_kind}").into(),
        )
    })?;
    let match_type = MatchType::from_stored(raw_match).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Integer,
            format!("unknown match type {raw_match}").into(),
        )
    })?;
    Ok(Token {
        id: row.get(0)?,
        kind,
        match_type,
        pattern: row.get(3)?,
        value1: row.get(4)?,
        value2: row.get(5)?,
        value3: row.get(6)?,
        tag: row.get(7)?,
        priority: row.get(8)?,
        accept_condition: row.get(9)?,
        flags: row.get::<_, i64>(10)? as u32,
    })
}
