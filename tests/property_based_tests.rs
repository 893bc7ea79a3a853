mod common;

use aksara::{LookupMode, MatchFilter};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

/// Roman input drawn from the scheme's alphabet plus characters the
/// scheme does not know, so passthrough paths get exercised too.
#[derive(Debug, Clone)]
struct RomanInput(String);

impl Arbitrary for RomanInput {
    fn arbitrary(g: &mut Gen) -> Self {
        let pieces = [
            "a", "aa", "k", "~", "_", "q", "z", "!", " ", "ka", "aak",
        ];
        let len = usize::arbitrary(g) % 12;
        let text = (0..len)
            .map(|_| *g.choose(&pieces).unwrap())
            .collect::<String>();
        RomanInput(text)
    }
}

#[quickcheck]
fn chosen_patterns_always_reassemble_the_input(input: RomanInput) -> bool {
    let fixture = common::devanagari();
    let groups = fixture
        .engine
        .tokenize(&input.0, LookupMode::Pattern, MatchFilter::Exact)
        .unwrap();
    let rebuilt: String = groups
        .iter()
        .map(|group| group[0].pattern.as_str())
        .collect();
    rebuilt == input.0
}

#[quickcheck]
fn every_group_has_at_least_one_candidate(input: RomanInput) -> bool {
    let fixture = common::devanagari();
    let groups = fixture
        .engine
        .tokenize(&input.0, LookupMode::Pattern, MatchFilter::Exact)
        .unwrap();
    groups.iter().all(|group| !group.is_empty())
}

#[quickcheck]
fn transliteration_never_panics_and_yields_one_literal(input: RomanInput) -> bool {
    let fixture = common::devanagari();
    match fixture.engine.transliterate(&input.0) {
        Ok(results) => input.0.is_empty() || !results.is_empty(),
        Err(_) => false,
    }
}
