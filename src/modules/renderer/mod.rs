//! Token rendering: assembling tokenizer output into script text and back.
//!
//! The forward resolver walks a flattened token sequence and applies the
//! script composition rules: viramas force explicit cluster breaks with a
//! ZWNJ, vowels switch between independent and dependent forms based on
//! what precedes them, and everything else contributes its primary value.
//! The reverse resolver rebuilds the Roman pattern text, inserting a
//! cancellation underscore where a standalone vowel would otherwise fuse
//! with its neighbour on the way back.
//!
//! Schemes may install a custom renderer pair keyed by scheme identifier.
//! A custom renderer runs before the default rules and may consume the
//! token, hand it back, or fail the render.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::modules::core::ZWNJ;
use crate::modules::symbols::{Token, TokenKind};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("scheme has no virama; cannot compose conjuncts")]
    MissingVirama,
    #[error("scheme renderer failed: {0}")]
    Renderer(String),
}

/// What a custom renderer did with the token it was offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The renderer wrote the output itself; default rules are skipped.
    Rendered,
    /// The renderer declined; default rules apply.
    Partial,
}

/// A scheme-specific renderer pair.
pub trait SchemeRenderer: Send {
    fn render(
        &self,
        previous: Option<&Token>,
        current: &Token,
        output: &mut String,
    ) -> Result<RenderOutcome, RenderError>;

    fn render_reverse(
        &self,
        previous: Option<&Token>,
        current: &Token,
        output: &mut String,
    ) -> Result<RenderOutcome, RenderError>;
}

/// Custom renderers, keyed by scheme identifier.
#[derive(Default)]
pub struct RendererRegistry {
    renderers: FxHashMap<String, Box<dyn SchemeRenderer>>,
}

impl RendererRegistry {
    pub fn register(&mut self, scheme_id: impl Into<String>, renderer: Box<dyn SchemeRenderer>) {
        self.renderers.insert(scheme_id.into(), renderer);
    }

    pub fn get(&self, scheme_id: &str) -> Option<&dyn SchemeRenderer> {
        self.renderers.get(scheme_id).map(|r| r.as_ref())
    }
}

/// Per-call rendering context: the cached virama, the scheme's custom
/// renderer if one is installed, and the digit routing flag.
pub struct Resolver<'a> {
    pub virama: Option<Token>,
    pub renderer: Option<&'a dyn SchemeRenderer>,
    pub use_indic_digits: bool,
}

impl Resolver<'_> {
    /// Renders a flattened token sequence into script text.
    pub fn resolve(&self, tokens: &[Token]) -> Result<String, RenderError> {
        let mut output = String::new();
        let mut previous: Option<&Token> = None;

        for token in tokens {
            if let Some(renderer) = self.renderer {
                if renderer.render(previous, token, &mut output)? == RenderOutcome::Rendered {
                    previous = Some(token);
                    continue;
                }
            }

            match token.kind {
                TokenKind::Virama => {
                    let virama = self.virama.as_ref().ok_or(RenderError::MissingVirama)?;
                    // An explicit virama always breaks the cluster: a bare
                    // ZWNJ if one is already pending, virama plus ZWNJ
                    // otherwise.
                    if !output.ends_with(&virama.value1) {
                        output.push_str(&virama.value1);
                    }
                    output.push_str(ZWNJ);
                }
                TokenKind::Vowel => {
                    if let Some(virama) = self
                        .virama
                        .as_ref()
                        .filter(|v| output.ends_with(v.value1.as_str()))
                    {
                        // A pending virama plus a vowel collapses into the
                        // dependent vowel sign.
                        output.truncate(output.len() - virama.value1.len());
                        output.push_str(&token.value2);
                    } else if previous.is_some_and(|p| p.kind != TokenKind::Other) {
                        output.push_str(&token.value2);
                    } else {
                        output.push_str(&token.value1);
                    }
                }
                TokenKind::NonJoiner | TokenKind::Joiner => {
                    output.push_str(&token.value1);
                    // The following vowel must take its independent form.
                    previous = None;
                    continue;
                }
                TokenKind::Number => {
                    if self.use_indic_digits || !is_ascii_digits(&token.pattern) {
                        output.push_str(&token.value1);
                    } else {
                        output.push_str(&token.pattern);
                    }
                }
                _ => output.push_str(&token.value1),
            }

            previous = Some(token);
        }

        Ok(output)
    }

    /// Renders value-mode tokenizer output back into Roman pattern text.
    /// Only the first token of each group participates.
    pub fn resolve_reverse(&self, groups: &[Vec<Token>]) -> Result<String, RenderError> {
        let mut output = String::new();
        let mut previous: Option<&Token> = None;

        for group in groups {
            let Some(token) = group.first() else { continue };

            if let Some(renderer) = self.renderer {
                if renderer.render_reverse(previous, token, &mut output)?
                    == RenderOutcome::Rendered
                {
                    previous = Some(token);
                    continue;
                }
            }

            // A vowel standing in full form beside an identical value is
            // ambiguous on the way back; the underscore keeps it apart.
            if token.kind == TokenKind::Vowel
                && previous.is_some_and(|p| p.value1 == token.value1)
            {
                output.push('_');
            }
            output.push_str(&token.pattern);

            previous = Some(token);
        }

        if output.ends_with('_') {
            output.truncate(output.len() - 1);
        }
        Ok(output)
    }
}

fn is_ascii_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::symbols::MatchType;

    fn token(kind: TokenKind, pattern: &str, value1: &str, value2: &str) -> Token {
        Token {
            id: 1,
            kind,
            match_type: MatchType::Exact,
            pattern: pattern.into(),
            value1: value1.into(),
            value2: value2.into(),
            value3: String::new(),
            tag: String::new(),
            priority: 0,
            accept_condition: 0,
            flags: 0,
        }
    }

    fn virama() -> Token {
        token(TokenKind::Virama, "~", "\u{0D4D}", "")
    }

    fn resolver(virama: Option<Token>) -> Resolver<'static> {
        Resolver {
            virama,
            renderer: None,
            use_indic_digits: false,
        }
    }

    #[test]
    fn vowel_after_consonant_takes_dependent_form() {
        let tokens = vec![
            token(TokenKind::Consonant, "ka", "\u{0D15}", ""),
            token(TokenKind::Vowel, "aa", "\u{0D06}", "\u{0D3E}"),
        ];
        let out = resolver(Some(virama())).resolve(&tokens).unwrap();
        assert_eq!(out, "\u{0D15}\u{0D3E}");
    }

    #[test]
    fn leading_vowel_takes_independent_form() {
        let tokens = vec![token(TokenKind::Vowel, "aa", "\u{0D06}", "\u{0D3E}")];
        let out = resolver(Some(virama())).resolve(&tokens).unwrap();
        assert_eq!(out, "\u{0D06}");
    }

    #[test]
    fn vowel_after_other_takes_independent_form() {
        let tokens = vec![
            Token::other("!"),
            token(TokenKind::Vowel, "aa", "\u{0D06}", "\u{0D3E}"),
        ];
        let out = resolver(Some(virama())).resolve(&tokens).unwrap();
        assert_eq!(out, "!\u{0D06}");
    }

    #[test]
    fn explicit_virama_appends_zwnj() {
        let tokens = vec![
            token(TokenKind::Consonant, "ka", "\u{0D15}", ""),
            virama(),
        ];
        let out = resolver(Some(virama())).resolve(&tokens).unwrap();
        assert_eq!(out, "\u{0D15}\u{0D4D}\u{200C}");
    }

    #[test]
    fn virama_after_pending_virama_only_adds_zwnj() {
        let tokens = vec![
            token(TokenKind::DeadConsonant, "k", "\u{0D15}\u{0D4D}", ""),
            virama(),
        ];
        let out = resolver(Some(virama())).resolve(&tokens).unwrap();
        assert_eq!(out, "\u{0D15}\u{0D4D}\u{200C}");
    }

    #[test]
    fn vowel_consumes_pending_virama() {
        let tokens = vec![
            token(TokenKind::DeadConsonant, "k", "\u{0D15}\u{0D4D}", ""),
            token(TokenKind::Vowel, "aa", "\u{0D06}", "\u{0D3E}"),
        ];
        let out = resolver(Some(virama())).resolve(&tokens).unwrap();
        assert_eq!(out, "\u{0D15}\u{0D3E}");
    }

    #[test]
    fn vowel_with_empty_dependent_form_cancels_virama_only() {
        let tokens = vec![
            token(TokenKind::DeadConsonant, "k", "\u{0D15}\u{0D4D}", ""),
            token(TokenKind::Vowel, "a", "\u{0D05}", ""),
        ];
        let out = resolver(Some(virama())).resolve(&tokens).unwrap();
        assert_eq!(out, "\u{0D15}");
    }

    #[test]
    fn virama_token_without_cached_virama_fails() {
        let tokens = vec![virama()];
        assert!(matches!(
            resolver(None).resolve(&tokens).unwrap_err(),
            RenderError::MissingVirama
        ));
    }

    #[test]
    fn non_joiner_resets_previous() {
        let tokens = vec![
            token(TokenKind::Vowel, "aa", "\u{0D06}", "\u{0D3E}"),
            token(TokenKind::NonJoiner, "_", "", ""),
            token(TokenKind::Vowel, "a", "\u{0D05}", ""),
        ];
        let out = resolver(Some(virama())).resolve(&tokens).unwrap();
        assert_eq!(out, "\u{0D06}\u{0D05}");
    }

    #[test]
    fn ascii_digits_pass_through_by_default() {
        let tokens = vec![token(TokenKind::Number, "4", "\u{0D6A}", "")];
        let out = resolver(None).resolve(&tokens).unwrap();
        assert_eq!(out, "4");
    }

    #[test]
    fn indic_digits_render_through_store_when_enabled() {
        let tokens = vec![token(TokenKind::Number, "4", "\u{0D6A}", "")];
        let ctx = Resolver {
            virama: None,
            renderer: None,
            use_indic_digits: true,
        };
        assert_eq!(ctx.resolve(&tokens).unwrap(), "\u{0D6A}");
    }

    #[test]
    fn reverse_appends_patterns() {
        let groups = vec![
            vec![token(TokenKind::Vowel, "a", "\u{0D05}", "")],
            vec![token(TokenKind::Consonant, "va", "\u{0D35}", "")],
            vec![token(TokenKind::Consonant, "n", "\u{0D7B}", "")],
        ];
        let out = resolver(None).resolve_reverse(&groups).unwrap();
        assert_eq!(out, "avan");
    }

    #[test]
    fn reverse_disambiguates_repeated_vowels() {
        let groups = vec![
            vec![token(TokenKind::Vowel, "a", "\u{0D05}", "")],
            vec![token(TokenKind::Vowel, "a", "\u{0D05}", "")],
        ];
        let out = resolver(None).resolve_reverse(&groups).unwrap();
        assert_eq!(out, "a_a");
    }

    #[test]
    fn reverse_first_token_never_takes_underscore() {
        let groups = vec![vec![token(TokenKind::Vowel, "a", "\u{0D05}", "")]];
        let out = resolver(None).resolve_reverse(&groups).unwrap();
        assert_eq!(out, "a");
    }

    struct Overriding;

    impl SchemeRenderer for Overriding {
        fn render(
            &self,
            _previous: Option<&Token>,
            current: &Token,
            output: &mut String,
        ) -> Result<RenderOutcome, RenderError> {
            if current.tag == "special" {
                output.push('!');
                return Ok(RenderOutcome::Rendered);
            }
            Ok(RenderOutcome::Partial)
        }

        fn render_reverse(
            &self,
            _previous: Option<&Token>,
            _current: &Token,
            _output: &mut String,
        ) -> Result<RenderOutcome, RenderError> {
            Ok(RenderOutcome::Partial)
        }
    }

    #[test]
    fn custom_renderer_consumes_tagged_tokens_and_falls_through_otherwise() {
        let mut special = token(TokenKind::Symbol, "s", "S", "");
        special.tag = "special".into();
        let plain = token(TokenKind::Symbol, "p", "P", "");

        let ctx = Resolver {
            virama: None,
            renderer: Some(&Overriding),
            use_indic_digits: false,
        };
        assert_eq!(ctx.resolve(&[special, plain]).unwrap(), "!P");
    }
}
