//! Script detection by Unicode block.
//!
//! Covers the Brahmic blocks this engine targets. Joiner control
//! characters are ignored; anything outside the known blocks, or input
//! mixing two scripts, detects as unknown rather than guessing.

/// Languages recognisable from their script block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Hindi,
    Bengali,
    Gujarati,
    Odia,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Unknown,
}

impl Language {
    /// ISO 639-1 code, where one exists.
    pub fn code(self) -> &'static str {
        match self {
            Language::Hindi => "hi",
            Language::Bengali => "bn",
            Language::Gujarati => "gu",
            Language::Odia => "or",
            Language::Tamil => "ta",
            Language::Telugu => "te",
            Language::Kannada => "kn",
            Language::Malayalam => "ml",
            Language::Unknown => "",
        }
    }
}

const RANGES: &[(u32, u32, Language)] = &[
    (0x0900, 0x097F, Language::Hindi),
    (0x0980, 0x09FF, Language::Bengali),
    (0x0A80, 0x0AFF, Language::Gujarati),
    (0x0B00, 0x0B7F, Language::Odia),
    (0x0B80, 0x0BFF, Language::Tamil),
    (0x0C00, 0x0C7F, Language::Telugu),
    (0x0C80, 0x0CFF, Language::Kannada),
    (0x0D00, 0x0D7F, Language::Malayalam),
];

fn block_of(codepoint: u32) -> Language {
    for &(start, end, language) in RANGES {
        if (start..=end).contains(&codepoint) {
            return language;
        }
    }
    Language::Unknown
}

fn is_joiner_control(codepoint: u32) -> bool {
    codepoint == 0x200C || codepoint == 0x200D
}

/// Detects the script of `input`. Mixed-script input is unknown.
pub fn detect(input: &str) -> Language {
    let mut detected = Language::Unknown;

    for ch in input.trim().chars() {
        let codepoint = ch as u32;
        if is_joiner_control(codepoint) {
            continue;
        }

        let language = block_of(codepoint);
        if language == Language::Unknown {
            return Language::Unknown;
        }
        if detected != Language::Unknown && language != detected {
            return Language::Unknown;
        }
        detected = language;
    }

    detected
}
