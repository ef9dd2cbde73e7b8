/*!
 * Title and filename similarity.
 *
 * Document matching cannot rely on body text alone when the translation
 * and the reference are in different languages, so filenames and titles
 * carry a second signal. Tokens are canonicalized through a small
 * cross-language equivalence table (oraciones and prayers land on the
 * same canonical form) before overlap is measured. The matcher damps
 * this signal before combining it with the text score; raw filename
 * overlap alone should never outrank strong body-text evidence.
 */

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use super::similarity::tokenize;

/// Tokens shorter than this carry no title signal
const MIN_TITLE_TOKEN_LEN: usize = 3;

/// Cross-language equivalents mapped to a canonical English form.
/// Covers the vocabulary that recurs in devotional and literary
/// catalogue titles across Spanish, French, Portuguese and German.
static TERM_EQUIVALENTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let pairs: &[(&str, &str)] = &[
        ("oraciones", "prayers"),
        ("prieres", "prayers"),
        ("oracoes", "prayers"),
        ("gebete", "prayers"),
        ("oracion", "prayer"),
        ("priere", "prayer"),
        ("oracao", "prayer"),
        ("gebet", "prayer"),
        ("palabras", "words"),
        ("paroles", "words"),
        ("palavras", "words"),
        ("worte", "words"),
        ("palabra", "word"),
        ("parole", "word"),
        ("palavra", "word"),
        ("wort", "word"),
        ("ocultas", "hidden"),
        ("oculto", "hidden"),
        ("cachees", "hidden"),
        ("escondidas", "hidden"),
        ("verborgene", "hidden"),
        ("dios", "god"),
        ("dieu", "god"),
        ("deus", "god"),
        ("gott", "god"),
        ("meditaciones", "meditations"),
        ("meditacoes", "meditations"),
        ("seleccion", "selection"),
        ("escritos", "writings"),
        ("ecrits", "writings"),
        ("schriften", "writings"),
        ("tablas", "tablets"),
        ("tablettes", "tablets"),
        ("pasajes", "passages"),
        ("libro", "book"),
        ("livre", "book"),
        ("livro", "book"),
        ("buch", "book"),
        ("epistola", "epistle"),
        ("nuevo", "new"),
        ("nueva", "new"),
        ("nouveau", "new"),
        ("historia", "history"),
        ("histoire", "history"),
    ];
    pairs.iter().copied().collect()
});

/// Scores title and filename affinity between documents
pub struct TitleScorer;

impl TitleScorer {
    pub fn new() -> Self {
        Self
    }

    /// Overlap coefficient of the canonical token sets, in [0, 1].
    ///
    /// The overlap coefficient (intersection over the smaller set) is
    /// deliberately lenient: a short translation filename that is fully
    /// contained in a long reference title scores 1.0.
    pub fn score(&self, translation_name: &str, reference_title: &str) -> f64 {
        let set_a = canonical_tokens(translation_name);
        let set_b = canonical_tokens(reference_title);

        if set_a.is_empty() || set_b.is_empty() {
            return 0.0;
        }

        let intersection = set_a.intersection(&set_b).count() as f64;
        let smaller = set_a.len().min(set_b.len()) as f64;
        intersection / smaller
    }
}

impl Default for TitleScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonicalized token set of a title or filename stem
fn canonical_tokens(name: &str) -> HashSet<String> {
    tokenize(name)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_TITLE_TOKEN_LEN)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| canonical_form(&t))
        .collect()
}

fn canonical_form(token: &str) -> String {
    let folded = fold_diacritics(token);
    match TERM_EQUIVALENTS.get(folded.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => folded,
    }
}

/// Strip the accents common in Romance-language titles so "oración"
/// and "oracion" canonicalize the same way
fn fold_diacritics(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
