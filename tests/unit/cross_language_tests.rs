/*!
 * Cross-language matching and alignment with a correlated embedding
 * provider standing in for a multilingual model.
 */

use std::path::PathBuf;
use std::sync::Arc;

use textgraft::app_config::MatchingConfig;
use textgraft::fragments::{FragmentSource, TranslationDocument};
use textgraft::matching::{ConfidenceTier, DocumentMatcher, MatchOutcome, ParagraphAligner};
use textgraft::scoring::SimilarityScorer;
use textgraft::structure::ReferenceDocument;

use crate::common::mock_providers::CorrelatedProvider;
use crate::common::{HIDDEN_WORDS_REFERENCE, PRAYERS_REFERENCE};

const SPANISH_TRANSLATION: &str =
    "Oraciones\n\nOh Dios! Concédeme que pueda servir a Tu Causa.";

fn embedding_scorer() -> Arc<SimilarityScorer> {
    Arc::new(SimilarityScorer::with_provider(Arc::new(
        CorrelatedProvider::new(),
    )))
}

fn reference(filename: &str, content: &str) -> Arc<ReferenceDocument> {
    let mut document = ReferenceDocument::from_str(content).unwrap();
    document.filename = filename.to_string();
    Arc::new(document)
}

fn spanish_document() -> TranslationDocument {
    let fragments = FragmentSource::from_raw(SPANISH_TRANSLATION).unwrap();
    TranslationDocument::new(PathBuf::from("oraciones-bahai.txt"), fragments)
}

#[test]
fn test_scoreSemantic_crossLanguagePair_shouldClearPassOneThreshold() {
    let scorer = embedding_scorer();
    let score = tokio_test::block_on(async {
        scorer
            .score_semantic(
                "Oh Dios! Concédeme que pueda servir a Tu Causa.",
                "O my God! Grant that I may serve Thy Cause.",
            )
            .await
    });

    assert!(
        score >= MatchingConfig::default().pass1_threshold,
        "cross-language score {:.3} below pass-1 threshold",
        score
    );
}

#[tokio::test]
async fn test_matchDocument_crossLanguageCatalogue_shouldPickPrayers() {
    let matcher = DocumentMatcher::new(embedding_scorer(), MatchingConfig::default());
    let candidates = vec![
        reference("prayers-bahai", PRAYERS_REFERENCE),
        reference("hidden-words", HIDDEN_WORDS_REFERENCE),
    ];

    let outcome = matcher.match_document(&spanish_document(), &candidates).await;

    match outcome {
        MatchOutcome::Matched(matched) => {
            assert_eq!(matched.reference_filename, "prayers-bahai");
            // Title evidence alone gives 1.0 * 0.85, inside the high tier
            assert_eq!(matched.tier, ConfidenceTier::High);
            assert!(!matched.review_required);
        }
        other => panic!("expected a match, got {:?}", other),
    }
}

#[tokio::test]
async fn test_align_crossLanguageFragments_shouldBindInPassOne() {
    let aligner = ParagraphAligner::new(embedding_scorer(), MatchingConfig::default());
    let reference = ReferenceDocument::from_str(
        "<html><body><h1>Prayers</h1>\
         <p id=\"p1\">O my God! Grant that I may serve Thy Cause.</p></body></html>",
    )
    .unwrap();
    let document = spanish_document();

    let outcome = aligner.align(&document.fragments, &reference.units).await;

    assert_eq!(outcome.alignments.len(), 2);
    assert!(outcome.alignments.iter().all(|a| a.pass == 1));
    assert!(outcome.unmatched_fragments.is_empty());

    let prayer = &outcome.alignments[1];
    assert_eq!(prayer.unit_id, "p1");
    assert!(prayer.score >= MatchingConfig::default().pass1_threshold);
}
