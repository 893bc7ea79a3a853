//! Word corpus export and import.
//!
//! Exports write JSON array files, `words_per_file` words each, named
//! `0.words.txt`, `1.words.txt` and so on. Each element carries the word,
//! its confidence and every stored pattern with its learned flag, which is
//! enough to rebuild the corpus elsewhere. Import accepts that JSON form
//! directly; plain `<word> <confidence>` lines are routed through the
//! learner by the caller.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{LearningStore, WordStoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedPattern {
    pub pattern: String,
    pub learned: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedWord {
    pub word: String,
    pub confidence: i64,
    pub patterns: Vec<ExportedPattern>,
}

/// Progress callback: (total words, words processed, current word).
pub type ExportProgress<'a> = &'a mut dyn FnMut(i64, i64, &str);

impl LearningStore {
    /// Writes the whole corpus as JSON files under `out_dir`.
    pub fn export_words(
        &self,
        words_per_file: usize,
        out_dir: impl AsRef<Path>,
        mut progress: Option<ExportProgress<'_>>,
    ) -> Result<(), WordStoreError> {
        debug_assert!(words_per_file > 0);
        let out_dir = out_dir.as_ref();
        let total = self.words_count(false)?;
        let conn = self.connection();

        // Speeds up the per-word pattern scans; dropped afterwards so the
        // store file keeps its shipped shape.
        conn.execute_batch(
            "create index if not exists tmp_patterns_word_id on patterns (word_id);",
        )?;

        let result = (|| -> Result<(), WordStoreError> {
            let mut word_stmt =
                conn.prepare("select id, word, confidence from words order by confidence desc")?;
            let mut pattern_stmt =
                conn.prepare("select pattern, learned from patterns where word_id = ?1")?;

            let mut batch: Vec<ExportedWord> = Vec::with_capacity(words_per_file);
            let mut file_index = 0usize;
            let mut processed = 0i64;

            let mut rows = word_stmt.query([])?;
            while let Some(row) = rows.next()? {
                let word_id: i64 = row.get(0)?;
                let word: String = row.get(1)?;
                let confidence: i64 = row.get(2)?;

                let patterns = pattern_stmt
                    .query_map(params![word_id], |row| {
                        Ok(ExportedPattern {
                            pattern: row.get(0)?,
                            learned: row.get::<_, i64>(1)? as u8,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                processed += 1;
                if let Some(callback) = progress.as_mut() {
                    callback(total, processed, &word);
                }

                batch.push(ExportedWord {
                    word,
                    confidence,
                    patterns,
                });

                if batch.len() == words_per_file {
                    write_batch(out_dir, file_index, &batch)?;
                    file_index += 1;
                    batch.clear();
                }
            }

            if !batch.is_empty() {
                write_batch(out_dir, file_index, &batch)?;
            }
            info!(total, "exported words");
            Ok(())
        })();

        conn.execute_batch("drop index if exists tmp_patterns_word_id;")?;
        result
    }

    /// Restores words and patterns from one exported JSON document.
    /// Existing words have the imported confidence added to theirs.
    pub fn import_json(&self, json: &str) -> Result<usize, WordStoreError> {
        let entries: Vec<ExportedWord> = serde_json::from_str(json)?;

        self.begin()?;
        let result = (|| -> Result<usize, WordStoreError> {
            for entry in &entries {
                let word_id = match self.try_insert_word(&entry.word, entry.confidence)? {
                    Some(id) => id,
                    None => {
                        self.connection()
                            .prepare_cached(
                                "update words set confidence = confidence + ?2 where word = ?1",
                            )?
                            .execute(params![entry.word, entry.confidence])?;
                        self.get_word_id(&entry.word)?
                            .ok_or_else(|| WordStoreError::UnknownWord(entry.word.clone()))?
                    }
                };

                for pattern in &entry.patterns {
                    self.persist_pattern(&pattern.pattern, word_id, pattern.learned == 0)?;
                }
            }
            Ok(entries.len())
        })();

        match result {
            Ok(count) => {
                self.commit()?;
                info!(count, "imported words");
                Ok(count)
            }
            Err(err) => {
                self.rollback();
                Err(err)
            }
        }
    }
}

fn write_batch(
    out_dir: &Path,
    file_index: usize,
    batch: &[ExportedWord],
) -> Result<(), WordStoreError> {
    let path = out_dir.join(format!("{file_index}.words.txt"));
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, batch)?;
    writer.flush()?;
    Ok(())
}
