mod common;

use aksara::{ConfigOption, LookupMode, MatchFilter, MatchType, TokenKind};

#[test]
fn forward_transliteration_composes_consonant_vowel_sequences() {
    let fixture = common::devanagari();
    let results = fixture.engine.transliterate("kaaka").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "काक");
    assert_eq!(results[0].confidence, 1);
}

#[test]
fn cancellation_character_forces_independent_vowel() {
    let fixture = common::devanagari();
    let results = fixture.engine.transliterate("aa_a").unwrap();
    assert_eq!(results[0].text, "आअ");
}

#[test]
fn explicit_virama_breaks_the_cluster() {
    let fixture = common::devanagari();
    let results = fixture.engine.transliterate("k~").unwrap();
    assert_eq!(results[0].text, "क\u{094D}\u{200C}");
}

#[test]
fn vowel_after_dead_consonant_consumes_the_virama() {
    let fixture = common::devanagari();
    // "kh" is the inferred dead consonant ख्; the vowel collapses its
    // pending virama into the matra.
    let results = fixture.engine.transliterate("khii").unwrap();
    assert_eq!(results[0].text, "खी");
}

#[test]
fn explicit_virama_then_vowel_keeps_the_cluster_break() {
    let fixture = common::devanagari();
    let results = fixture.engine.transliterate("k~aa").unwrap();
    assert_eq!(results[0].text, "क\u{094D}\u{200C}\u{093E}");
}

#[test]
fn unknown_characters_pass_through() {
    let fixture = common::devanagari();
    // The vowel after the passthrough "!" takes its independent form.
    let results = fixture.engine.transliterate("kaa!aa").unwrap();
    assert_eq!(results[0].text, "का!आ");
}

#[test]
fn reassembly_of_chosen_patterns_is_byte_exact() {
    let fixture = common::devanagari();
    for input in ["kaaka", "aa_a", "k~aa", "xyz", "kaqaa", "a", ""] {
        let groups = fixture
            .engine
            .tokenize(input, LookupMode::Pattern, MatchFilter::Exact)
            .unwrap();
        let rebuilt: String = groups
            .iter()
            .map(|group| group[0].pattern.as_str())
            .collect();
        assert_eq!(rebuilt, input, "input {input:?} did not reassemble");
    }
}

#[test]
fn digits_pass_through_unless_indic_digits_enabled() {
    let fixture = common::devanagari();
    let mut engine = fixture.engine;
    engine
        .create_token("4", "\u{096A}", "", "", "", TokenKind::Number, MatchType::Exact, false)
        .unwrap();

    assert_eq!(engine.transliterate("4").unwrap()[0].text, "4");

    engine.configure(ConfigOption::UseIndicDigits(true)).unwrap();
    assert_eq!(engine.transliterate("4").unwrap()[0].text, "\u{096A}");
}

#[test]
fn tokenization_is_identical_with_and_without_prefix_flags() {
    let fixture = common::devanagari();
    let inputs = ["kaaka", "aa_a", "kqa", "aaaa", "k~aa"];

    let before: Vec<Vec<String>> = inputs
        .iter()
        .map(|input| {
            fixture
                .engine
                .tokenize(input, LookupMode::Pattern, MatchFilter::Exact)
                .unwrap()
                .iter()
                .map(|group| group[0].pattern.clone())
                .collect()
        })
        .collect();

    fixture.engine.stamp_prefix_flags().unwrap();

    let after: Vec<Vec<String>> = inputs
        .iter()
        .map(|input| {
            fixture
                .engine
                .tokenize(input, LookupMode::Pattern, MatchFilter::Exact)
                .unwrap()
                .iter()
                .map(|group| group[0].pattern.clone())
                .collect()
        })
        .collect();

    assert_eq!(before, after);
}
