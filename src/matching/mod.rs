/*!
 * Document matching and paragraph alignment.
 */

pub mod aligner;
pub mod document;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use aligner::{Alignment, AlignmentOutcome, ParagraphAligner};
pub use document::{DocumentMatch, DocumentMatcher, MatchOutcome};

/// Score band floors for confidence tiers
const HIGH_TIER_FLOOR: f64 = 0.75;
const MEDIUM_TIER_FLOOR: f64 = 0.45;

/// Discrete confidence band derived from a continuous score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_TIER_FLOOR {
            ConfidenceTier::High
        } else if score >= MEDIUM_TIER_FLOOR {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    /// The lowest tier always requires manual review
    pub fn requires_review(&self) -> bool {
        matches!(self, ConfidenceTier::Low)
    }

    /// One band lower; used when validation flags escalate review
    pub fn demoted(&self) -> Self {
        match self {
            ConfidenceTier::High => ConfidenceTier::Medium,
            ConfidenceTier::Medium | ConfidenceTier::Low => ConfidenceTier::Low,
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::High => write!(f, "high"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::Low => write!(f, "low"),
        }
    }
}

impl FromStr for ConfidenceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(ConfidenceTier::High),
            "medium" => Ok(ConfidenceTier::Medium),
            "low" => Ok(ConfidenceTier::Low),
            other => Err(format!("Unknown confidence tier: {}", other)),
        }
    }
}
