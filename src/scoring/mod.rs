/*!
 * Similarity scoring between translated text and reference material.
 */

pub mod similarity;
pub mod title;

pub use similarity::{tokenize, SimilarityScorer};
pub use title::TitleScorer;
