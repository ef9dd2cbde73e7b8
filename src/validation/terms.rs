/*!
 * Translator-maintained term list.
 *
 * A flat file of `term=counterpart` pairs, loaded once per run. Each pair
 * names a transliterated term and the form expected in the translated
 * text; validation flags alignments where one side appears without the
 * other.
 */

use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use super::ReviewFlag;

/// One curated term and its expected translated counterpart
#[derive(Debug, Clone, PartialEq)]
pub struct TermPair {
    pub term: String,
    pub counterpart: String,
}

/// The loaded term list
#[derive(Debug, Clone, Default)]
pub struct TermList {
    pairs: Vec<TermPair>,
}

impl TermList {
    /// Load pairs from a file. Blank lines and `#` comments are skipped;
    /// a line without `=` is ignored rather than fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read term list: {}", path.display()))?;

        let list = Self::parse(&content);
        info!("Loaded {} term pairs from {}", list.pairs.len(), path.display());
        Ok(list)
    }

    pub fn parse(content: &str) -> Self {
        let pairs = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let (term, counterpart) = line.split_once('=')?;
                let term = term.trim();
                let counterpart = counterpart.trim();
                if term.is_empty() || counterpart.is_empty() {
                    return None;
                }
                Some(TermPair {
                    term: term.to_lowercase(),
                    counterpart: counterpart.to_lowercase(),
                })
            })
            .collect();
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Flag pairs present on one side of an alignment but not the other
    pub fn check(&self, reference_text: &str, fragment_text: &str) -> Vec<ReviewFlag> {
        let reference = reference_text.to_lowercase();
        let fragment = fragment_text.to_lowercase();

        let mut flags = Vec::new();
        for pair in &self.pairs {
            if reference.contains(&pair.term) && !fragment.contains(&pair.counterpart) {
                flags.push(ReviewFlag::MissingTerm {
                    term: pair.counterpart.clone(),
                });
            } else if fragment.contains(&pair.counterpart) && !reference.contains(&pair.term) {
                flags.push(ReviewFlag::MissingTerm {
                    term: pair.term.clone(),
                });
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shouldSkipCommentsAndBlankLines() {
        let list = TermList::parse(
            "# curated terms\n\nBaha'u'llah=Bahá'u'lláh\n  Kitab = Libro \nmalformed line\n",
        );
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_check_termWithoutCounterpart_shouldFlag() {
        let list = TermList::parse("Kitab=Libro");
        let flags = list.check("The Kitab speaks of this.", "El texto habla de esto.");
        assert_eq!(
            flags,
            vec![ReviewFlag::MissingTerm {
                term: "libro".to_string()
            }]
        );
    }

    #[test]
    fn test_check_counterpartWithoutTerm_shouldFlagReverseDirection() {
        let list = TermList::parse("Kitab=Libro");
        let flags = list.check("The book speaks of this.", "El Libro habla de esto.");
        assert_eq!(
            flags,
            vec![ReviewFlag::MissingTerm {
                term: "kitab".to_string()
            }]
        );
    }

    #[test]
    fn test_check_bothSidesPresent_shouldNotFlag() {
        let list = TermList::parse("Kitab=Libro");
        let flags = list.check("The Kitab speaks.", "El Libro habla.");
        assert!(flags.is_empty());
    }

    #[test]
    fn test_check_caseInsensitive() {
        let list = TermList::parse("KITAB=LIBRO");
        let flags = list.check("the kitab speaks", "el libro habla");
        assert!(flags.is_empty());
    }

    #[test]
    fn test_load_missingFile_shouldError() {
        assert!(TermList::load("/no/such/terms.txt").is_err());
    }
}
