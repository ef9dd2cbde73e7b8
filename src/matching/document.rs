/*!
 * Whole-document matching.
 *
 * Assigns a translation document to exactly one reference from the
 * catalogue, or marks it unmatched. Each candidate gets a combined score
 * of `max(text_score, title_score * damping)`; title evidence corroborates
 * but never outweighs strong body-text evidence. Below the hard floor the
 * translation is recorded as unmatched with the best score kept as
 * evidence, never forced onto the best of a bad set.
 */

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::app_config::MatchingConfig;
use crate::fragments::TranslationDocument;
use crate::scoring::{SimilarityScorer, TitleScorer};
use crate::structure::ReferenceDocument;

use super::ConfidenceTier;

/// A persisted decision binding a translation to one reference document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMatch {
    pub translation_id: String,
    pub reference_filename: String,
    pub score: f64,
    pub tier: ConfidenceTier,
    pub review_required: bool,
}

/// Outcome of matching one translation against the catalogue
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(DocumentMatch),
    /// No candidate cleared the floor; evidence kept for audit
    Unmatched {
        translation_id: String,
        best_score: f64,
        best_reference: Option<String>,
    },
}

pub struct DocumentMatcher {
    scorer: Arc<SimilarityScorer>,
    titles: TitleScorer,
    config: MatchingConfig,
}

impl DocumentMatcher {
    pub fn new(scorer: Arc<SimilarityScorer>, config: MatchingConfig) -> Self {
        Self {
            scorer,
            titles: TitleScorer::new(),
            config,
        }
    }

    /// Match one translation against all candidate references.
    ///
    /// An empty candidate list yields an unmatched outcome with no
    /// evidence rather than an error.
    pub async fn match_document(
        &self,
        translation: &TranslationDocument,
        candidates: &[Arc<ReferenceDocument>],
    ) -> MatchOutcome {
        let translation_text = translation.full_text();
        let translation_name = translation.filename();

        let mut best_score = 0.0f64;
        let mut best_reference: Option<&ReferenceDocument> = None;

        for candidate in candidates {
            let score = self
                .combined_score(&translation_text, &translation_name, candidate.as_ref())
                .await;
            debug!(
                "Candidate {} scored {:.3} for translation {}",
                candidate.filename, score, translation_name
            );
            if score > best_score {
                best_score = score;
                best_reference = Some(candidate);
            }
        }

        let Some(reference) = best_reference.filter(|_| best_score >= self.config.match_floor)
        else {
            info!(
                "Translation {} unmatched (best score {:.3}, floor {:.2})",
                translation_name, best_score, self.config.match_floor
            );
            return MatchOutcome::Unmatched {
                translation_id: translation.id.clone(),
                best_score,
                best_reference: best_reference.map(|r| r.filename.clone()),
            };
        };

        let tier = ConfidenceTier::from_score(best_score);
        info!(
            "Translation {} matched to {} (score {:.3}, tier {})",
            translation_name, reference.filename, best_score, tier
        );

        MatchOutcome::Matched(DocumentMatch {
            translation_id: translation.id.clone(),
            reference_filename: reference.filename.clone(),
            score: best_score,
            tier,
            review_required: tier.requires_review(),
        })
    }

    async fn combined_score(
        &self,
        translation_text: &str,
        translation_name: &str,
        candidate: &ReferenceDocument,
    ) -> f64 {
        let text_score = self
            .scorer
            .score_semantic(translation_text, &candidate.full_text())
            .await;

        let candidate_name = file_stem(&candidate.filename);
        let title_score = self
            .titles
            .score(&file_stem(translation_name), &candidate_name)
            * self.config.title_damping;

        text_score.max(title_score)
    }
}

fn file_stem(name: &str) -> String {
    std::path::Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::FragmentSource;
    use crate::structure::ReferenceDocument;
    use std::path::PathBuf;

    fn reference(filename: &str, body: &str) -> Arc<ReferenceDocument> {
        let xml = format!("<html><body><p id=\"p1\">{}</p></body></html>", body);
        let mut document = ReferenceDocument::from_str(&xml).unwrap();
        document.filename = filename.to_string();
        Arc::new(document)
    }

    fn translation(filename: &str, text: &str) -> TranslationDocument {
        let fragments = FragmentSource::from_raw(text).unwrap();
        TranslationDocument::new(PathBuf::from(filename), fragments)
    }

    fn config() -> MatchingConfig {
        MatchingConfig::default()
    }

    #[tokio::test]
    async fn test_matchDocument_sameLanguageOverlap_shouldPickBestCandidate() {
        let matcher = DocumentMatcher::new(Arc::new(SimilarityScorer::new()), config());
        let candidates = vec![
            reference(
                "prayers.xml",
                "O my God! Grant that I may serve Thy Cause among Thy people.",
            ),
            reference(
                "inventory.xml",
                "Quarterly inventory figures for warehouse operations and logistics.",
            ),
        ];
        let t = translation(
            "prayers-copy.txt",
            "O my God! Grant that I may serve Thy Cause among Thy people.",
        );

        match matcher.match_document(&t, &candidates).await {
            MatchOutcome::Matched(m) => {
                assert_eq!(m.reference_filename, "prayers.xml");
                assert_eq!(m.tier, ConfidenceTier::High);
                assert!(!m.review_required);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_matchDocument_crossLanguageFilenames_shouldMatchViaTitle() {
        let matcher = DocumentMatcher::new(Arc::new(SimilarityScorer::new()), config());
        let candidates = vec![reference(
            "prayers-and-meditations.xml",
            "O my God! Grant that I may serve Thy Cause.",
        )];
        let t = translation(
            "oraciones-y-meditaciones.pdf",
            "Oh Dios! Concédeme que pueda servir a Tu Causa.",
        );

        match matcher.match_document(&t, &candidates).await {
            MatchOutcome::Matched(m) => {
                // Title evidence alone: damped but well above the floor
                assert!(m.score >= 0.4, "score {}", m.score);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_matchDocument_unrelatedReference_shouldBeUnmatched() {
        let matcher = DocumentMatcher::new(Arc::new(SimilarityScorer::new()), config());
        let candidates = vec![reference(
            "hidden-words.xml",
            "O Son of Spirit! My first counsel is this.",
        )];
        let t = translation(
            "informe-trimestral.pdf",
            "Cifras del inventario trimestral para las operaciones del almacén.",
        );

        match matcher.match_document(&t, &candidates).await {
            MatchOutcome::Unmatched { best_score, .. } => {
                assert!(best_score < 0.15, "score {}", best_score);
            }
            other => panic!("expected unmatched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_matchDocument_noCandidates_shouldBeUnmatched() {
        let matcher = DocumentMatcher::new(Arc::new(SimilarityScorer::new()), config());
        let t = translation("doc.pdf", "some text");

        match matcher.match_document(&t, &[]).await {
            MatchOutcome::Unmatched { best_reference, .. } => {
                assert!(best_reference.is_none());
            }
            other => panic!("expected unmatched, got {:?}", other),
        }
    }
}
