/*!
 * Post-alignment validation.
 *
 * Checks run over every alignment regardless of its score and attach
 * review flags; a flag never blocks an alignment from being written, it
 * marks it for human attention and demotes its confidence tier.
 */

pub mod service;
pub mod terms;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use service::ValidationFlagger;
pub use terms::TermList;

/// A reason an alignment needs human attention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReviewFlag {
    /// A curated term appears on one side without its counterpart
    MissingTerm { term: String },
    /// The alignment breaks document order beyond tolerance
    OrderInversion { expected_rank: usize, actual_rank: usize },
    /// Fragment and unit lengths diverge suspiciously
    LengthAnomaly { ratio: f64 },
    /// Produced by the gap-filling pass; mandatory review
    GapFill,
    /// Inline runs the writer could not place confidently
    AmbiguousRuns { count: usize },
}

impl fmt::Display for ReviewFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewFlag::MissingTerm { term } => write!(f, "missing term '{}'", term),
            ReviewFlag::OrderInversion {
                expected_rank,
                actual_rank,
            } => write!(
                f,
                "order inversion (expected rank {}, actual {})",
                expected_rank, actual_rank
            ),
            ReviewFlag::LengthAnomaly { ratio } => {
                write!(f, "length anomaly (ratio {:.2})", ratio)
            }
            ReviewFlag::GapFill => write!(f, "gap-filling pass"),
            ReviewFlag::AmbiguousRuns { count } => {
                write!(f, "{} ambiguous inline runs", count)
            }
        }
    }
}
