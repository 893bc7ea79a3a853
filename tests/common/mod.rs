//! Shared scheme fixtures for the integration tests.

use aksara::{Aksara, ConfigOption, MatchType, TokenKind};
use tempfile::TempDir;

pub struct Fixture {
    pub engine: Aksara,
    // Keeps the store files alive for the duration of a test.
    #[allow(dead_code)]
    pub dir: TempDir,
}

fn token(
    engine: &Aksara,
    pattern: &str,
    value1: &str,
    value2: &str,
    kind: TokenKind,
    match_type: MatchType,
) {
    engine
        .create_token(pattern, value1, value2, "", "", kind, match_type, false)
        .unwrap();
}

/// A small Devanagari scheme: vowels with dependent forms, one consonant,
/// a virama and the cancellation non-joiner.
#[allow(dead_code)]
pub fn devanagari() -> Fixture {
    let dir = TempDir::new().unwrap();
    let engine = Aksara::new(dir.path().join("hi.vst")).unwrap();

    token(&engine, "~", "\u{094D}", "", TokenKind::Virama, MatchType::Exact);
    token(&engine, "a", "\u{0905}", "", TokenKind::Vowel, MatchType::Exact);
    token(
        &engine,
        "aa",
        "\u{0906}",
        "\u{093E}",
        TokenKind::Vowel,
        MatchType::Exact,
    );
    token(
        &engine,
        "ii",
        "\u{0908}",
        "\u{0940}",
        TokenKind::Vowel,
        MatchType::Exact,
    );
    token(&engine, "k", "\u{0915}", "", TokenKind::Consonant, MatchType::Exact);
    // Dead-consonant inference also derives "kh" as ख plus virama.
    token(&engine, "kha", "\u{0916}", "", TokenKind::Consonant, MatchType::Exact);
    engine
        .create_token("_", "", "", "", "", TokenKind::NonJoiner, MatchType::Exact, false)
        .unwrap();

    Fixture { engine, dir }
}

/// A Malayalam scheme rich enough for the learning tests: the consonants
/// of "malayalam", the long vowel with a short possibility spelling, an
/// anusvara and a virama. Dead-consonant inference stays off so the
/// consonant patterns remain as written.
#[allow(dead_code)]
pub fn malayalam_with_store() -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut engine = Aksara::new(dir.path().join("ml.vst")).unwrap();
    engine
        .configure(ConfigOption::UseDeadConsonants(false))
        .unwrap();

    token(&engine, "~", "\u{0D4D}", "", TokenKind::Virama, MatchType::Exact);
    token(&engine, "a", "\u{0D05}", "", TokenKind::Vowel, MatchType::Exact);
    token(
        &engine,
        "aa",
        "\u{0D06}",
        "\u{0D3E}",
        TokenKind::Vowel,
        MatchType::Exact,
    );
    // The long vowel is also commonly typed short.
    token(
        &engine,
        "a",
        "\u{0D06}",
        "\u{0D3E}",
        TokenKind::Vowel,
        MatchType::Possibility,
    );
    token(&engine, "ma", "\u{0D2E}", "", TokenKind::Consonant, MatchType::Exact);
    token(&engine, "la", "\u{0D32}", "", TokenKind::Consonant, MatchType::Exact);
    token(&engine, "ya", "\u{0D2F}", "", TokenKind::Consonant, MatchType::Exact);
    token(&engine, "La", "\u{0D33}", "", TokenKind::Consonant, MatchType::Exact);
    token(
        &engine,
        "la",
        "\u{0D33}",
        "",
        TokenKind::Consonant,
        MatchType::Possibility,
    );
    token(&engine, "m", "\u{0D02}", "", TokenKind::Anusvara, MatchType::Exact);
    token(&engine, "v", "\u{0D35}", "", TokenKind::Consonant, MatchType::Exact);
    token(&engine, "n", "\u{0D7B}", "", TokenKind::Consonant, MatchType::Exact);

    engine.stamp_prefix_flags().unwrap();

    let store_path = dir.path().join("ml.learnings");
    engine
        .configure(ConfigOption::EnableSuggestions(Some(store_path)))
        .unwrap();

    Fixture { engine, dir }
}
