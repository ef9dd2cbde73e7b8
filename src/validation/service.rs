/*!
 * Validation checks over a completed alignment set.
 */

use log::debug;

use crate::fragments::TranslationFragment;
use crate::matching::Alignment;
use crate::structure::StructuralUnit;

use super::{ReviewFlag, TermList};

/// Length ratio (shorter/longer) below which an alignment is suspicious
const LENGTH_ANOMALY_FLOOR: f64 = 0.3;

/// Allowed rank drift before an alignment counts as an order inversion
const ORDER_TOLERANCE: usize = 3;

/// Runs term, ordering and length checks over alignments
pub struct ValidationFlagger {
    terms: Option<TermList>,
}

impl ValidationFlagger {
    pub fn new(terms: Option<TermList>) -> Self {
        Self { terms }
    }

    /// Apply all checks, attaching flags in place. Any alignment that
    /// gains a flag has its confidence tier demoted one band.
    pub fn validate(
        &self,
        alignments: &mut [Alignment],
        fragments: &[TranslationFragment],
        units: &[StructuralUnit],
    ) {
        let order_flags = self.order_flags(alignments);

        for (index, alignment) in alignments.iter_mut().enumerate() {
            let mut new_flags = Vec::new();

            let fragment = fragments.get(alignment.fragment_index);
            let unit = units.get(alignment.unit_ordinal);

            if let (Some(fragment), Some(unit)) = (fragment, unit) {
                if let Some(terms) = &self.terms {
                    new_flags.extend(terms.check(&unit.plain_text, &fragment.text));
                }
                if let Some(ratio) = length_anomaly(&unit.plain_text, &fragment.text) {
                    new_flags.push(ReviewFlag::LengthAnomaly { ratio });
                }
            }

            if let Some(flag) = order_flags.get(&index) {
                new_flags.push(flag.clone());
            }

            if !new_flags.is_empty() {
                debug!(
                    "Alignment for fragment {} flagged: {}",
                    alignment.fragment_index,
                    new_flags
                        .iter()
                        .map(|f| f.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                alignment.tier = alignment.tier.demoted();
                alignment.flags.extend(new_flags);
            }
        }
    }

    /// Compare each alignment's unit rank against its fragment-order
    /// position across the whole set. Keyed by position in `alignments`
    /// (already sorted by fragment index).
    fn order_flags(
        &self,
        alignments: &[Alignment],
    ) -> std::collections::HashMap<usize, ReviewFlag> {
        let mut ordinals: Vec<usize> = alignments.iter().map(|a| a.unit_ordinal).collect();
        ordinals.sort_unstable();

        let mut flags = std::collections::HashMap::new();
        for (position, alignment) in alignments.iter().enumerate() {
            // Ordinals are unique per alignment set, so this rank is exact
            let rank = ordinals
                .binary_search(&alignment.unit_ordinal)
                .unwrap_or(position);
            if rank.abs_diff(position) > ORDER_TOLERANCE {
                flags.insert(
                    position,
                    ReviewFlag::OrderInversion {
                        expected_rank: position,
                        actual_rank: rank,
                    },
                );
            }
        }
        flags
    }
}

/// Ratio of shorter to longer character length, when anomalous
fn length_anomaly(a: &str, b: &str) -> Option<f64> {
    let len_a = a.chars().count() as f64;
    let len_b = b.chars().count() as f64;
    if len_a == 0.0 || len_b == 0.0 {
        return None;
    }
    let ratio = len_a.min(len_b) / len_a.max(len_b);
    (ratio < LENGTH_ANOMALY_FLOOR).then_some(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::ConfidenceTier;
    use crate::structure::ReferenceDocument;

    fn units_from(texts: &[&str]) -> Vec<StructuralUnit> {
        let body: String = texts.iter().map(|t| format!("<p>{}</p>", t)).collect();
        let xml = format!("<html><body>{}</body></html>", body);
        ReferenceDocument::from_str(&xml).unwrap().units
    }

    fn fragment(index: usize, text: &str) -> TranslationFragment {
        TranslationFragment {
            sequence_index: index,
            text: text.to_string(),
            page: None,
        }
    }

    fn alignment(fragment_index: usize, unit_ordinal: usize) -> Alignment {
        Alignment {
            fragment_index,
            unit_id: format!("u{}", unit_ordinal),
            unit_ordinal,
            score: 0.8,
            tier: ConfidenceTier::High,
            pass: 1,
            flags: Vec::new(),
            approved: false,
        }
    }

    #[test]
    fn test_validate_missingTerm_shouldFlagAndDemote() {
        let flagger = ValidationFlagger::new(Some(TermList::parse("Kitab=Libro")));
        let units = units_from(&["The Kitab speaks of many things here."]);
        let fragments = vec![fragment(0, "El texto habla de muchas cosas.")];
        let mut alignments = vec![alignment(0, 0)];

        flagger.validate(&mut alignments, &fragments, &units);

        assert!(matches!(
            alignments[0].flags.as_slice(),
            [ReviewFlag::MissingTerm { .. }]
        ));
        assert_eq!(alignments[0].tier, ConfidenceTier::Medium);
    }

    #[test]
    fn test_validate_lengthAnomaly_shouldFlag() {
        let flagger = ValidationFlagger::new(None);
        let units = units_from(&[
            "A very long reference passage that goes on and on with many words and clauses.",
        ]);
        let fragments = vec![fragment(0, "Corto.")];
        let mut alignments = vec![alignment(0, 0)];

        flagger.validate(&mut alignments, &fragments, &units);

        assert!(matches!(
            alignments[0].flags.as_slice(),
            [ReviewFlag::LengthAnomaly { .. }]
        ));
    }

    #[test]
    fn test_validate_orderInversion_shouldFlagBeyondTolerance() {
        let flagger = ValidationFlagger::new(None);
        let texts: Vec<String> = (0..8)
            .map(|i| format!("Reference passage number {} with enough text.", i))
            .collect();
        let units = units_from(&texts.iter().map(|s| s.as_str()).collect::<Vec<_>>());
        let fragments: Vec<TranslationFragment> = (0..8)
            .map(|i| fragment(i, &format!("Fragmento {} con texto suficiente aqui.", i)))
            .collect();

        // Fragment 0 jumped to the last unit, five ranks out of place
        let mut alignments: Vec<Alignment> = vec![
            alignment(0, 7),
            alignment(1, 0),
            alignment(2, 1),
            alignment(3, 2),
            alignment(4, 3),
            alignment(5, 4),
        ];

        flagger.validate(&mut alignments, &fragments, &units);

        assert!(alignments[0]
            .flags
            .iter()
            .any(|f| matches!(f, ReviewFlag::OrderInversion { .. })));
        assert!(!alignments[2]
            .flags
            .iter()
            .any(|f| matches!(f, ReviewFlag::OrderInversion { .. })));
    }

    #[test]
    fn test_validate_cleanAlignment_shouldKeepTier() {
        let flagger = ValidationFlagger::new(None);
        let units = units_from(&["A passage of reasonable length for comparison."]);
        let fragments = vec![fragment(0, "Un pasaje de longitud razonable para comparar.")];
        let mut alignments = vec![alignment(0, 0)];

        flagger.validate(&mut alignments, &fragments, &units);

        assert!(alignments[0].flags.is_empty());
        assert_eq!(alignments[0].tier, ConfidenceTier::High);
    }
}
