//! Greedy longest-match tokenization over the symbol store.
//!
//! The tokenizer walks the input one code point at a time, extending a
//! lookup buffer while the store can still contain a longer match, and
//! emits one match group per segment: every token tied at the longest
//! matched prefix. Input spans no symbol covers become synthetic
//! passthrough tokens, so concatenating the chosen patterns always
//! reassembles the input byte for byte.

use rusqlite::params;
use tracing::trace;

use super::{token_from_row, MatchType, SymbolStore, SymbolStoreError, Token};

/// Which indexed columns a lookup runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Roman pattern column; the forward direction.
    Pattern,
    /// Script value columns; the reverse and learning direction.
    Value,
}

/// Restricts which rows a lookup may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFilter {
    Exact,
    Possibility,
    All,
}

impl MatchFilter {
    fn accepts(self) -> Option<i64> {
        match self {
            MatchFilter::Exact => Some(MatchType::Exact.as_stored()),
            MatchFilter::Possibility => Some(MatchType::Possibility.as_stored()),
            MatchFilter::All => None,
        }
    }
}

/// First token of every group, cloned into a flat sequence. The first row
/// is the store-order winner among candidates tied at the same length.
pub fn flatten_first(groups: &[Vec<Token>]) -> Vec<Token> {
    groups.iter().filter_map(|g| g.first().cloned()).collect()
}

impl SymbolStore {
    /// Segments `input` into match groups.
    ///
    /// Each group holds every candidate token for one segment, in storage
    /// order; downstream consumers pick. Empty input yields an empty list.
    pub fn tokenize(
        &self,
        input: &str,
        mode: LookupMode,
        filter: MatchFilter,
    ) -> Result<Vec<Vec<Token>>, SymbolStoreError> {
        let mut result = Vec::new();
        if input.is_empty() {
            return Ok(result);
        }

        trace!(input, ?mode, "tokenizing");

        let bytes = input.len();
        let mut start = 0usize;
        while start < bytes {
            let rest = &input[start..];
            let mut group: Vec<Token> = Vec::new();
            let mut group_from_store = false;
            let mut match_len = 0usize;

            for (idx, ch) in rest.char_indices() {
                let end = idx + ch.len_utf8();
                let lookup = &rest[..end];

                let rows = self.lookup_symbols(lookup, mode, filter)?;
                if !rows.is_empty() {
                    group = rows;
                    group_from_store = true;
                    match_len = end;
                }

                if group.is_empty() {
                    // Nothing matches this code point; it passes through.
                    group.push(Token::other(lookup));
                    match_len = end;
                }

                // Flag bits describe the row actually matched, so they only
                // answer the probe while the lookup sits at the match.
                let longer_match_possible = if group_from_store
                    && match_len == end
                    && self.flags_stamped()
                {
                    group.iter().any(|t| match mode {
                        LookupMode::Pattern => t.has_more_pattern_matches(),
                        LookupMode::Value => t.has_more_value_matches(),
                    })
                } else {
                    self.prefix_exists(lookup, mode)?
                };

                if !longer_match_possible || start + end >= bytes {
                    break;
                }
            }

            result.push(group);
            start += match_len;
        }

        Ok(result)
    }

    fn lookup_symbols(
        &self,
        lookup: &str,
        mode: LookupMode,
        filter: MatchFilter,
    ) -> Result<Vec<Token>, SymbolStoreError> {
        let conn = self.connection();
        let mut tokens = Vec::new();
        match (mode, filter.accepts()) {
            (LookupMode::Pattern, Some(match_type)) => {
                let mut stmt = conn.prepare_cached(
                    "select id, type, match_type, pattern, value1, value2, value3, tag,
                            priority, accept_condition, flags
                     from symbols where pattern = ?1 and match_type = ?2 order by id",
                )?;
                let rows = stmt.query_map(params![lookup, match_type], token_from_row)?;
                for row in rows {
                    tokens.push(row?);
                }
            }
            (LookupMode::Pattern, None) => {
                let mut stmt = conn.prepare_cached(
                    "select id, type, match_type, pattern, value1, value2, value3, tag,
                            priority, accept_condition, flags
                     from symbols where pattern = ?1 order by id",
                )?;
                let rows = stmt.query_map(params![lookup], token_from_row)?;
                for row in rows {
                    tokens.push(row?);
                }
            }
            (LookupMode::Value, Some(match_type)) => {
                let mut stmt = conn.prepare_cached(
                    "select id, type, match_type, pattern, value1, value2, value3, tag,
                            priority, accept_condition, flags
                     from symbols where (value1 = ?1 or value2 = ?1) and match_type = ?2
                     order by id",
                )?;
                let rows = stmt.query_map(params![lookup, match_type], token_from_row)?;
                for row in rows {
                    tokens.push(row?);
                }
            }
            (LookupMode::Value, None) => {
                let mut stmt = conn.prepare_cached(
                    "select id, type, match_type, pattern, value1, value2, value3, tag,
                            priority, accept_condition, flags
                     from symbols where value1 = ?1 or value2 = ?1 order by id",
                )?;
                let rows = stmt.query_map(params![lookup], token_from_row)?;
                for row in rows {
                    tokens.push(row?);
                }
            }
        }
        Ok(tokens)
    }

    /// Does any symbol strictly extend `lookup` in the given direction?
    fn prefix_exists(&self, lookup: &str, mode: LookupMode) -> Result<bool, SymbolStoreError> {
        let conn = self.connection();
        let exists: bool = match mode {
            LookupMode::Pattern => {
                let mut stmt = conn.prepare_cached(
                    "select exists(select 1 from symbols
                       where length(pattern) > length(?1)
                         and substr(pattern, 1, length(?1)) = ?1)",
                )?;
                stmt.query_row(params![lookup], |row| row.get(0))?
            }
            LookupMode::Value => {
                let mut stmt = conn.prepare_cached(
                    "select exists(select 1 from symbols
                       where (length(value1) > length(?1)
                              and substr(value1, 1, length(?1)) = ?1)
                          or (length(value2) > length(?1)
                              and substr(value2, 1, length(?1)) = ?1))",
                )?;
                stmt.query_row(params![lookup], |row| row.get(0))?
            }
        };
        Ok(exists)
    }
}
