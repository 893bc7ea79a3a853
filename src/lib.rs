//! # Aksara: Self-Learning Indic Transliteration Engine
//!
//! Aksara converts Roman (ASCII) input into Indic-script text and back,
//! driven by a compiled scheme of transliteration rules stored in a SQLite
//! file. A second, optional store remembers words the user has confirmed
//! and ranks them into suggestions on later inputs.
//!
//! ## Architecture
//!
//! - **Symbol store**: the scheme's rule table, indexed by Roman pattern
//!   and by script value.
//! - **Tokenizer**: greedy longest-match segmentation over the store, with
//!   every candidate kept when several rules tie.
//! - **Renderer**: token sequence to script text (and back), enforcing
//!   virama composition, dependent vowel forms and cluster breaks.
//! - **Learning store and learner**: confirmed words, the Cartesian set of
//!   Roman spellings that produce them, and prefix patterns for
//!   autocomplete.
//!
//! ## Quick start
//!
//! ```no_run
//! use aksara::Aksara;
//!
//! let engine = Aksara::new("ml.vst").unwrap();
//! for suggestion in engine.transliterate("malayalam").unwrap() {
//!     println!("{} ({})", suggestion.text, suggestion.confidence);
//! }
//! ```
//!
//! A handle is single-threaded; callers serialise access to one handle and
//! open more handles for parallelism. Handles may share a scheme file, and
//! may share a learning store, whose write-ahead journal serialises the
//! writers.

pub mod modules;

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use modules::learn::{self, LearnError};
use modules::renderer::{RendererRegistry, Resolver};
use modules::symbols::tokenizer::flatten_first;
use modules::symbols::{PersistOptions, SymbolStore, SymbolStoreError};
use modules::words::{LearningStore, WordStoreError};

pub use modules::core::{CorpusDetails, LearnStatus, SchemeDetails, Suggestion};
pub use modules::langdetect::Language;
pub use modules::renderer::{RenderError, RenderOutcome, SchemeRenderer};
pub use modules::symbols::{LookupMode, MatchFilter, MatchType, Token, TokenKind};
pub use modules::words::{ExportedPattern, ExportedWord};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    Args(String),
    #[error("invalid encoding; expected UTF-8")]
    Encoding,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Symbols(#[from] SymbolStoreError),
    #[error(transparent)]
    Words(#[from] WordStoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Learn(#[from] LearnError),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the failure was a duplicate-symbol insert.
    pub fn is_duplicate_token(&self) -> bool {
        matches!(
            self,
            EngineError::Symbols(SymbolStoreError::DuplicateToken { .. })
        )
    }
}

/// Runtime configuration options, applied through [`Aksara::configure`].
/// None of these persist into the scheme file.
#[derive(Debug, Clone)]
pub enum ConfigOption {
    /// Infer dead consonants while persisting tokens. On by default.
    UseDeadConsonants(bool),
    /// Route ASCII digits through the scheme's number tokens. Off by
    /// default; digits pass through verbatim.
    UseIndicDigits(bool),
    /// Skip duplicate symbol inserts instead of erroring. Off by default.
    IgnoreDuplicateToken(bool),
    /// Open the learning store at the given path, or close it with `None`.
    EnableSuggestions(Option<PathBuf>),
}

/// An engine instance bound to one scheme file.
pub struct Aksara {
    symbols: SymbolStore,
    words: Option<LearningStore>,
    renderers: RendererRegistry,
    use_dead_consonants: bool,
    use_indic_digits: bool,
    ignore_duplicate_tokens: bool,
    scheme_details: RefCell<Option<SchemeDetails>>,
}

impl Aksara {
    /// Opens a scheme file, creating its schema when the file is new.
    pub fn new(scheme_path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Ok(Aksara {
            symbols: SymbolStore::open(scheme_path)?,
            words: None,
            renderers: RendererRegistry::default(),
            use_dead_consonants: true,
            use_indic_digits: false,
            ignore_duplicate_tokens: false,
            scheme_details: RefCell::new(None),
        })
    }

    pub fn configure(&mut self, option: ConfigOption) -> Result<(), EngineError> {
        match option {
            ConfigOption::UseDeadConsonants(value) => self.use_dead_consonants = value,
            ConfigOption::UseIndicDigits(value) => self.use_indic_digits = value,
            ConfigOption::IgnoreDuplicateToken(value) => self.ignore_duplicate_tokens = value,
            ConfigOption::EnableSuggestions(Some(path)) => {
                if path.as_os_str().is_empty() {
                    return Err(EngineError::InvalidConfig(
                        "learning store path is empty".into(),
                    ));
                }
                self.words = Some(LearningStore::open(path)?);
            }
            ConfigOption::EnableSuggestions(None) => self.words = None,
        }
        Ok(())
    }

    /// Persists one transliteration rule into the scheme.
    ///
    /// With `buffered` set, the write joins an open transaction that
    /// [`flush_buffer`] commits; an error rolls the whole buffer back.
    ///
    /// [`flush_buffer`]: Self::flush_buffer
    #[allow(clippy::too_many_arguments)]
    pub fn create_token(
        &self,
        pattern: &str,
        value1: &str,
        value2: &str,
        value3: &str,
        tag: &str,
        kind: TokenKind,
        match_type: MatchType,
        buffered: bool,
    ) -> Result<(), EngineError> {
        if pattern.trim().is_empty() {
            return Err(EngineError::Args("pattern must not be empty".into()));
        }
        if value1.is_empty() && !kind.is_joiner() {
            return Err(EngineError::Args("value1 must not be empty".into()));
        }

        if buffered {
            self.symbols.start_buffering()?;
        }

        let opts = PersistOptions {
            use_dead_consonants: self.use_dead_consonants,
            ignore_duplicates: self.ignore_duplicate_tokens,
        };
        match self
            .symbols
            .persist_token(pattern, value1, value2, value3, tag, kind, match_type, opts)
        {
            Ok(()) => Ok(()),
            Err(err) => {
                if buffered {
                    self.symbols.discard_buffer();
                }
                Err(err.into())
            }
        }
    }

    /// Commits buffered scheme writes.
    pub fn flush_buffer(&self) -> Result<(), EngineError> {
        Ok(self.symbols.flush_buffer()?)
    }

    /// Derives a consonant-vowel token for every dead consonant and vowel
    /// in the scheme.
    pub fn generate_cv_combinations(&self) -> Result<(), EngineError> {
        Ok(self.symbols.generate_cv_combinations()?)
    }

    /// Stamps the prefix-continuation bits. Run once after the scheme's
    /// rules are in place.
    pub fn stamp_prefix_flags(&self) -> Result<(), EngineError> {
        Ok(self.symbols.stamp_prefix_flags()?)
    }

    pub fn get_all_tokens(&self, kind: TokenKind) -> Result<Vec<Token>, EngineError> {
        Ok(self.symbols.get_all_tokens(kind)?)
    }

    /// Exposes the tokenizer directly. Most callers want
    /// [`transliterate`] or [`reverse_transliterate`] instead.
    ///
    /// [`transliterate`]: Self::transliterate
    /// [`reverse_transliterate`]: Self::reverse_transliterate
    pub fn tokenize(
        &self,
        input: &str,
        mode: LookupMode,
        filter: MatchFilter,
    ) -> Result<Vec<Vec<Token>>, EngineError> {
        Ok(self.symbols.tokenize(input, mode, filter)?)
    }

    pub fn set_scheme_details(&self, details: &SchemeDetails) -> Result<(), EngineError> {
        self.symbols.set_scheme_details(details)?;
        *self.scheme_details.borrow_mut() = None;
        Ok(())
    }

    /// Scheme metadata, cached after the first read.
    pub fn scheme_details(&self) -> Result<SchemeDetails, EngineError> {
        if let Some(details) = self.scheme_details.borrow().as_ref() {
            return Ok(details.clone());
        }
        let details = self.symbols.get_scheme_details()?;
        *self.scheme_details.borrow_mut() = Some(details.clone());
        Ok(details)
    }

    /// Installs a custom renderer pair for a scheme identifier. The
    /// renderer runs before the default rules whenever the open scheme
    /// carries that identifier.
    pub fn register_renderer(
        &mut self,
        scheme_id: impl Into<String>,
        renderer: Box<dyn SchemeRenderer>,
    ) {
        self.renderers.register(scheme_id, renderer);
    }

    /// Transliterates Roman input into ranked script candidates.
    ///
    /// Learned exact matches come first, confidence descending. When none
    /// exist, the words table is consulted for longest-prefix compositions.
    /// The literal letter-by-letter rendering always appears, followed by
    /// prefix-range suggestions.
    pub fn transliterate(&self, input: &str) -> Result<Vec<Suggestion>, EngineError> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        debug!(input, "transliterating");

        let resolver = self.resolver()?;
        let groups = self
            .symbols
            .tokenize(input, LookupMode::Pattern, MatchFilter::Exact)?;
        let literal = resolver.resolve(&flatten_first(&groups))?;

        let mut results: Vec<Suggestion> = Vec::new();

        if let Some(store) = &self.words {
            for suggestion in store.get_best_match(input)? {
                push_unique(&mut results, suggestion);
            }

            if results.is_empty() && input.len() > 2 {
                for path in store.tokenize_via_words(&self.symbols, input)? {
                    let text = resolver.resolve(&path)?;
                    push_unique(&mut results, Suggestion::new(text, 1));
                }
            }
        }

        push_unique(&mut results, Suggestion::new(literal, 1));

        if let Some(store) = &self.words {
            for suggestion in store.get_suggestions(input)? {
                push_unique(&mut results, suggestion);
            }
        }

        Ok(results)
    }

    /// Converts script text back into its Roman spelling.
    pub fn reverse_transliterate(&self, input: &str) -> Result<String, EngineError> {
        use unicode_normalization::UnicodeNormalization;

        let normalized: String = input.nfc().collect();
        let groups = self
            .symbols
            .tokenize(&normalized, LookupMode::Value, MatchFilter::Exact)?;
        let resolver = self.resolver()?;
        let result = resolver.resolve_reverse(&groups)?;
        debug!(input, result = %result, "reverse transliterated");
        Ok(result)
    }

    /// Learns a confirmed word with confidence 1; re-learning an existing
    /// word bumps its confidence instead.
    pub fn learn(&self, word: &str) -> Result<(), EngineError> {
        self.learn_with_confidence(word, 1)
    }

    pub fn learn_with_confidence(&self, word: &str, confidence: i64) -> Result<(), EngineError> {
        let store = self.words_store()?;
        let resolver = self.resolver()?;
        learn::learn(&self.symbols, store, &resolver, word, confidence)?;
        Ok(())
    }

    /// Associates an explicit Roman pattern with a word.
    pub fn train(&self, pattern: &str, word: &str) -> Result<(), EngineError> {
        let store = self.words_store()?;
        learn::train(&self.symbols, store, pattern, word)?;
        Ok(())
    }

    /// Learns one word per line from a text file, reporting per-line
    /// status through the callback. A failing line does not stop the run.
    pub fn learn_from_file(
        &self,
        path: impl AsRef<Path>,
        callback: Option<&mut dyn FnMut(&str, Option<&LearnError>)>,
    ) -> Result<LearnStatus, EngineError> {
        let store = self.words_store()?;
        let resolver = self.resolver()?;
        Ok(learn::learn_from_file(
            &self.symbols,
            store,
            &resolver,
            path,
            callback,
        )?)
    }

    /// Removes a word and its patterns. Unknown words are a no-op.
    pub fn delete_word(&self, word: &str) -> Result<(), EngineError> {
        Ok(self.words_store()?.delete_word(word)?)
    }

    pub fn is_known_word(&self, word: &str) -> Result<bool, EngineError> {
        match &self.words {
            Some(store) => Ok(store.is_known_word(word)?),
            None => Ok(false),
        }
    }

    pub fn corpus_details(&self) -> Result<CorpusDetails, EngineError> {
        let store = self.words_store()?;
        Ok(CorpusDetails {
            words_count: store.words_count(false)?,
            learned_words_count: store.words_count(true)?,
        })
    }

    /// Exports the learned corpus as JSON files under `out_dir`.
    pub fn export_words(
        &self,
        words_per_file: usize,
        out_dir: impl AsRef<Path>,
    ) -> Result<(), EngineError> {
        if words_per_file == 0 {
            return Err(EngineError::Args("words_per_file must be positive".into()));
        }
        Ok(self
            .words_store()?
            .export_words(words_per_file, out_dir, None)?)
    }

    pub fn export_words_with_progress(
        &self,
        words_per_file: usize,
        out_dir: impl AsRef<Path>,
        progress: &mut dyn FnMut(i64, i64, &str),
    ) -> Result<(), EngineError> {
        if words_per_file == 0 {
            return Err(EngineError::Args("words_per_file must be positive".into()));
        }
        Ok(self
            .words_store()?
            .export_words(words_per_file, out_dir, Some(progress))?)
    }

    /// Imports learnings from an exported JSON file, or from plain
    /// `<word> <confidence>` lines routed through the learner.
    pub fn import_learnings_from_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<LearnStatus, EngineError> {
        let store = self.words_store()?;
        let bytes = std::fs::read(path.as_ref())?;
        let text = String::from_utf8(bytes).map_err(|_| EngineError::Encoding)?;

        if text.trim_start().starts_with('[') {
            let total = store.import_json(&text)?;
            Ok(LearnStatus { total, failed: 0 })
        } else {
            let resolver = self.resolver()?;
            Ok(learn::learn_from_file(
                &self.symbols,
                store,
                &resolver,
                path,
                None,
            )?)
        }
    }

    /// Compacts the learning store file.
    pub fn compact_learning_store(&self) -> Result<(), EngineError> {
        Ok(self.words_store()?.compact()?)
    }

    /// Detects the script of a word by Unicode block. Mixed-script input
    /// detects as [`Language::Unknown`].
    pub fn detect_language(&self, word: &str) -> Language {
        modules::langdetect::detect(word)
    }

    fn words_store(&self) -> Result<&LearningStore, EngineError> {
        self.words
            .as_ref()
            .ok_or(EngineError::Learn(LearnError::StoreNotEnabled))
    }

    fn resolver(&self) -> Result<Resolver<'_>, EngineError> {
        let virama = self.symbols.get_virama()?;
        let details = self.scheme_details()?;
        let renderer = if details.identifier.is_empty() {
            None
        } else {
            self.renderers.get(&details.identifier)
        };
        Ok(Resolver {
            virama,
            renderer,
            use_indic_digits: self.use_indic_digits,
        })
    }
}

fn push_unique(results: &mut Vec<Suggestion>, candidate: Suggestion) {
    if !results.iter().any(|s| s.text == candidate.text) {
        results.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> Aksara {
        let engine = Aksara::new(":memory:").unwrap();
        engine
            .create_token("~", "\u{094D}", "", "", "", TokenKind::Virama, MatchType::Exact, false)
            .unwrap();
        engine
            .create_token("a", "\u{0905}", "", "", "", TokenKind::Vowel, MatchType::Exact, false)
            .unwrap();
        engine
            .create_token(
                "aa",
                "\u{0906}",
                "\u{093E}",
                "",
                "",
                TokenKind::Vowel,
                MatchType::Exact,
                false,
            )
            .unwrap();
        engine
            .create_token("k", "\u{0915}", "", "", "", TokenKind::Consonant, MatchType::Exact, false)
            .unwrap();
        engine
    }

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn forward_transliteration_composes_dependent_vowels() {
        let engine = scheme();
        let results = engine.transliterate("kaaka").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "\u{0915}\u{093E}\u{0915}");
        assert_eq!(results[0].confidence, 1);
    }

    #[test]
    fn non_joiner_forces_independent_vowel() {
        let engine = scheme();
        engine
            .create_token("_", "", "", "", "", TokenKind::NonJoiner, MatchType::Exact, false)
            .unwrap();
        let results = engine.transliterate("aa_a").unwrap();
        assert_eq!(results[0].text, "\u{0906}\u{0905}");
    }

    #[test]
    fn empty_input_produces_no_candidates() {
        let engine = scheme();
        assert!(engine.transliterate("").unwrap().is_empty());
    }

    #[test]
    fn duplicate_token_errors_then_ignores_after_configuration() {
        let mut engine = Aksara::new(":memory:").unwrap();
        engine
            .create_token("x", "X1", "", "", "", TokenKind::Symbol, MatchType::Exact, false)
            .unwrap();
        let err = engine
            .create_token("x", "X1", "", "", "", TokenKind::Symbol, MatchType::Exact, false)
            .unwrap_err();
        assert!(err.is_duplicate_token());

        engine
            .configure(ConfigOption::IgnoreDuplicateToken(true))
            .unwrap();
        engine
            .create_token("x", "X1", "", "", "", TokenKind::Symbol, MatchType::Exact, false)
            .unwrap();
        assert_eq!(engine.get_all_tokens(TokenKind::Symbol).unwrap().len(), 1);
    }

    #[test]
    fn learning_requires_an_enabled_store() {
        let engine = scheme();
        assert!(matches!(
            engine.learn("\u{0915}\u{093E}").unwrap_err(),
            EngineError::Learn(LearnError::StoreNotEnabled)
        ));
    }

    #[test]
    fn empty_learning_store_path_is_invalid() {
        let mut engine = scheme();
        assert!(matches!(
            engine.configure(ConfigOption::EnableSuggestions(Some(PathBuf::new()))),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
