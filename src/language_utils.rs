/*!
 * Language detection and ISO code utilities.
 *
 * Translation documents arrive without a declared language; a stopword
 * profile over the fragment text is enough to pick the source language
 * for matching and reporting. Codes are normalized through isolang.
 */

use isolang::Language;

/// Stopword profiles used for detection. Each entry is (ISO 639-1 code,
/// high-frequency function words).
const PROFILES: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "and", "of", "to", "that", "is", "in", "thou", "thy", "may",
        ],
    ),
    (
        "es",
        &[
            "el", "la", "de", "que", "y", "en", "los", "del", "las", "por", "para", "con", "una",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "de", "et", "les", "des", "que", "dans", "pour", "une", "est",
        ],
    ),
    (
        "pt",
        &[
            "o", "a", "de", "que", "e", "do", "da", "em", "um", "para", "com", "não", "uma", "os",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "und", "das", "ist", "von", "den", "mit", "für", "nicht", "ein",
        ],
    ),
];

/// Minimum stopword hits before a detection is trusted
const MIN_HITS: usize = 3;

/// Detect the language of a text from its stopword profile.
///
/// Returns None when the text is too short or no profile stands out.
pub fn detect_language(text: &str) -> Option<Language> {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return None;
    }

    let mut best: Option<(&str, usize)> = None;
    for (code, words) in PROFILES {
        let hits = tokens.iter().filter(|t| words.contains(&t.as_str())).count();
        match best {
            Some((_, best_hits)) if hits <= best_hits => {}
            _ => best = Some((code, hits)),
        }
    }

    let (code, hits) = best?;
    if hits < MIN_HITS {
        return None;
    }

    Language::from_639_1(code)
}

/// English name for an ISO 639-1 code, if recognized
pub fn language_name(code: &str) -> Option<&'static str> {
    Language::from_639_1(code).map(|l| l.to_name())
}

/// Normalize a language name or code into an ISO 639-1 code
pub fn normalize_code(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.len() == 2 {
        return Language::from_639_1(&trimmed.to_lowercase())
            .and_then(|l| l.to_639_1())
            .map(|c| c.to_string());
    }

    Language::from_name(trimmed)
        .and_then(|l| l.to_639_1())
        .map(|c| c.to_string())
}
