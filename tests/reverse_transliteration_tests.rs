mod common;

#[test]
fn reverse_transliteration_rebuilds_patterns() {
    let fixture = common::malayalam_with_store();
    assert_eq!(
        fixture.engine.reverse_transliterate("അവൻ").unwrap(),
        "avan"
    );
}

#[test]
fn repeated_standalone_vowels_are_disambiguated() {
    let fixture = common::malayalam_with_store();
    assert_eq!(fixture.engine.reverse_transliterate("അഅ").unwrap(), "a_a");
}

#[test]
fn first_token_never_triggers_disambiguation() {
    let fixture = common::malayalam_with_store();
    assert_eq!(fixture.engine.reverse_transliterate("അ").unwrap(), "a");
}

#[test]
fn unknown_script_characters_pass_through() {
    let fixture = common::malayalam_with_store();
    assert_eq!(
        fixture.engine.reverse_transliterate("അ?ൻ").unwrap(),
        "a?n"
    );
}

#[test]
fn empty_input_reverses_to_empty() {
    let fixture = common::malayalam_with_store();
    assert_eq!(fixture.engine.reverse_transliterate("").unwrap(), "");
}

#[test]
fn roundtrip_through_script_and_back() {
    let fixture = common::devanagari();
    let forward = fixture.engine.transliterate("kaak").unwrap();
    let back = fixture
        .engine
        .reverse_transliterate(&forward[0].text)
        .unwrap();
    assert_eq!(back, "kaak");
}
