/*!
 * Two-pass paragraph alignment.
 *
 * Pass 1 walks the translation fragments in order against a cursor into
 * the reference's structural units, searching only a small forward window
 * so the cost stays O(fragments x window) rather than all-pairs. Repeated
 * failures quarantine the stalest window unit instead of retrying it
 * forever. Pass 2 is a gap-filling sweep restricted to the residue of
 * pass 1 on both sides, with a relaxed threshold and a bonus for
 * order-consistent neighbors; everything it emits is flagged for review.
 */

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::app_config::MatchingConfig;
use crate::fragments::TranslationFragment;
use crate::scoring::SimilarityScorer;
use crate::structure::StructuralUnit;
use crate::validation::ReviewFlag;

use super::ConfidenceTier;

/// One fragment bound to one structural unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alignment {
    pub fragment_index: usize,
    pub unit_id: String,
    /// Document-order rank of the unit, used by ordering validation
    pub unit_ordinal: usize,
    pub score: f64,
    pub tier: ConfidenceTier,
    pub pass: u8,
    pub flags: Vec<ReviewFlag>,
    pub approved: bool,
}

impl Alignment {
    /// Whether a reviewer must look at this alignment before approval
    pub fn needs_review(&self) -> bool {
        self.tier.requires_review() || !self.flags.is_empty()
    }
}

/// Result of aligning one (translation, reference) pair
#[derive(Debug, Clone)]
pub struct AlignmentOutcome {
    pub alignments: Vec<Alignment>,
    /// Fragment indices left unaligned after both passes
    pub unmatched_fragments: Vec<usize>,
    /// Unit ids never matched by either pass
    pub unmatched_units: Vec<String>,
    /// Scoring calls spent on this pair
    pub score_calls: u64,
}

pub struct ParagraphAligner {
    scorer: Arc<SimilarityScorer>,
    config: MatchingConfig,
}

impl ParagraphAligner {
    pub fn new(scorer: Arc<SimilarityScorer>, config: MatchingConfig) -> Self {
        Self { scorer, config }
    }

    /// Align fragments to structural units. Sequential by design: the
    /// cursor state cannot be parallelized within one document pair.
    pub async fn align(
        &self,
        fragments: &[TranslationFragment],
        units: &[StructuralUnit],
    ) -> AlignmentOutcome {
        let calls_before = self.scorer.call_count();

        // matched[ordinal] holds the fragment index bound to that unit
        let mut matched: Vec<Option<usize>> = vec![None; units.len()];
        let mut quarantined = vec![false; units.len()];
        let mut alignments: Vec<Alignment> = Vec::new();
        let mut aligned_fragments = vec![false; fragments.len()];

        self.run_pass_one(
            fragments,
            units,
            &mut matched,
            &mut quarantined,
            &mut alignments,
            &mut aligned_fragments,
        )
        .await;

        self.run_pass_two(
            fragments,
            units,
            &mut matched,
            &mut alignments,
            &mut aligned_fragments,
        )
        .await;

        alignments.sort_by_key(|a| a.fragment_index);

        let unmatched_fragments = aligned_fragments
            .iter()
            .enumerate()
            .filter(|(_, aligned)| !**aligned)
            .map(|(i, _)| i)
            .collect();
        let unmatched_units = matched
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_none())
            .map(|(i, _)| units[i].id.clone())
            .collect();

        AlignmentOutcome {
            alignments,
            unmatched_fragments,
            unmatched_units,
            score_calls: self.scorer.call_count() - calls_before,
        }
    }

    async fn run_pass_one(
        &self,
        fragments: &[TranslationFragment],
        units: &[StructuralUnit],
        matched: &mut [Option<usize>],
        quarantined: &mut [bool],
        alignments: &mut Vec<Alignment>,
        aligned_fragments: &mut [bool],
    ) {
        let mut cursor = 0usize;
        let mut failures = 0usize;

        for (fragment_index, fragment) in fragments.iter().enumerate() {
            let window = self.window(units.len(), cursor, matched, quarantined);
            if window.is_empty() {
                break;
            }

            let mut best_ordinal = window[0];
            let mut best_score = f64::MIN;
            for &ordinal in &window {
                let score = self
                    .scorer
                    .score_semantic(&fragment.text, &units[ordinal].plain_text)
                    .await;
                if score > best_score {
                    best_score = score;
                    best_ordinal = ordinal;
                }
            }

            if best_score >= self.config.pass1_threshold {
                debug!(
                    "Pass 1: fragment {} -> unit {} (score {:.3})",
                    fragment_index, units[best_ordinal].id, best_score
                );
                matched[best_ordinal] = Some(fragment_index);
                aligned_fragments[fragment_index] = true;
                alignments.push(Alignment {
                    fragment_index,
                    unit_id: units[best_ordinal].id.clone(),
                    unit_ordinal: best_ordinal,
                    score: best_score,
                    tier: ConfidenceTier::from_score(best_score),
                    pass: 1,
                    flags: Vec::new(),
                    approved: false,
                });
                cursor = best_ordinal + 1;
                failures = 0;
            } else {
                failures += 1;
                if failures >= self.config.quarantine_limit {
                    // Stalest unmatched unit is the one nearest the cursor
                    let stalest = window[0];
                    debug!(
                        "Quarantining unit {} after {} consecutive failures",
                        units[stalest].id, failures
                    );
                    quarantined[stalest] = true;
                    failures = 0;
                }
            }
        }
    }

    async fn run_pass_two(
        &self,
        fragments: &[TranslationFragment],
        units: &[StructuralUnit],
        matched: &mut [Option<usize>],
        alignments: &mut Vec<Alignment>,
        aligned_fragments: &mut [bool],
    ) {
        let residual_fragments: Vec<usize> = (0..fragments.len())
            .filter(|i| !aligned_fragments[*i])
            .collect();

        for fragment_index in residual_fragments {
            let fragment = &fragments[fragment_index];

            let mut best: Option<(usize, f64)> = None;
            for ordinal in 0..units.len() {
                if matched[ordinal].is_some() {
                    continue;
                }
                let base = self
                    .scorer
                    .score_semantic(&fragment.text, &units[ordinal].plain_text)
                    .await;
                let score = (base + self.neighbor_bonus(ordinal, fragment_index, matched))
                    .min(1.0);
                if best.map(|(_, s)| score > s).unwrap_or(true) {
                    best = Some((ordinal, score));
                }
            }

            let Some((ordinal, score)) = best else {
                continue;
            };
            if score < self.config.pass2_threshold {
                continue;
            }

            debug!(
                "Pass 2: fragment {} -> unit {} (score {:.3})",
                fragment_index, units[ordinal].id, score
            );
            matched[ordinal] = Some(fragment_index);
            aligned_fragments[fragment_index] = true;
            alignments.push(Alignment {
                fragment_index,
                unit_id: units[ordinal].id.clone(),
                unit_ordinal: ordinal,
                score,
                tier: ConfidenceTier::from_score(score),
                pass: 2,
                flags: vec![ReviewFlag::GapFill],
                approved: false,
            });
        }
    }

    /// Next window of candidate ordinals at or past the cursor
    fn window(
        &self,
        unit_count: usize,
        cursor: usize,
        matched: &[Option<usize>],
        quarantined: &[bool],
    ) -> Vec<usize> {
        (cursor..unit_count)
            .filter(|&i| matched[i].is_none() && !quarantined[i])
            .take(self.config.window_size)
            .collect()
    }

    /// Bonus when the candidate's document neighbors were matched to the
    /// fragment's sequence neighbors
    fn neighbor_bonus(
        &self,
        ordinal: usize,
        fragment_index: usize,
        matched: &[Option<usize>],
    ) -> f64 {
        let mut bonus = 0.0;
        if ordinal > 0
            && fragment_index > 0
            && matched[ordinal - 1] == Some(fragment_index - 1)
        {
            bonus += self.config.neighbor_bonus;
        }
        if ordinal + 1 < matched.len()
            && matched[ordinal + 1] == Some(fragment_index + 1)
        {
            bonus += self.config.neighbor_bonus;
        }
        bonus
    }
}
