/*!
 * Full ingest/process/export lifecycle over an in-memory store.
 */

use textgraft::file_utils::FileManager;
use textgraft::fragments::TranslationStatus;
use textgraft::pipeline::PipelineOrchestrator;

use crate::common::{
    build_context, create_test_file, HIDDEN_WORDS_REFERENCE, PRAYERS_REFERENCE,
    PRAYERS_TRANSLATION,
};

#[tokio::test]
async fn test_pipeline_endToEnd_shouldMatchAlignAndGraft() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[("prayers-bahai.xml", PRAYERS_REFERENCE)])
        .await
        .unwrap();
    let orchestrator = PipelineOrchestrator::new(context.clone());

    let source =
        create_test_file(root.path(), "prayers-translation.txt", PRAYERS_TRANSLATION).unwrap();
    orchestrator.ingest(&[source.clone()]).await.unwrap();

    let summary = orchestrator.process().await.unwrap();
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.unmatched, 0);
    assert_eq!(summary.failed, 0);

    let record = context
        .repository
        .find_translation_by_path(&source.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TranslationStatus::Matched.to_string());

    let match_record = context
        .repository
        .get_match(&record.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(match_record.tier.as_deref(), Some("high"));
    assert!(!match_record.review_required);

    let alignments = context.repository.get_alignments(&record.id).await.unwrap();
    assert_eq!(alignments.len(), 3);
    assert!(alignments.iter().all(|a| a.pass == 1));

    // Grafted output keeps the reference markup; the inline span
    // relocates to the first translated word of its unit
    let output_path = FileManager::grafted_output_path(
        &record.path,
        &context.config.output_dir,
        record.language.as_deref(),
    );
    let output = std::fs::read_to_string(&output_path).unwrap();
    assert!(output.contains("vital"));
    assert!(output.contains("<span class=\"hl\">This</span>"));
    assert!(output.contains("<p id=\"p1\">"));
}

#[tokio::test]
async fn test_pipeline_unrelatedTranslation_shouldPersistUnmatchedEvidence() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[("hidden-words.xml", HIDDEN_WORDS_REFERENCE)])
        .await
        .unwrap();
    let orchestrator = PipelineOrchestrator::new(context.clone());

    let source = create_test_file(
        root.path(),
        "oraciones-bahai.txt",
        "Oraciones\n\nOh Dios! Concédeme que pueda servir a Tu Causa.",
    )
    .unwrap();
    orchestrator.ingest(&[source.clone()]).await.unwrap();

    let summary = orchestrator.process().await.unwrap();
    assert_eq!(summary.matched, 0);
    assert_eq!(summary.unmatched, 1);

    let record = context
        .repository
        .find_translation_by_path(&source.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TranslationStatus::Unmatched.to_string());

    // Score evidence is kept for audit, with no confidence tier
    let evidence = context
        .repository
        .get_match(&record.id)
        .await
        .unwrap()
        .unwrap();
    assert!(evidence.tier.is_none());
    assert!(evidence.review_required);
    assert!(evidence.score < 0.15);

    assert!(context.repository.get_alignments(&record.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pipeline_export_shouldRewriteOutputFromStoredAlignments() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[("prayers-bahai.xml", PRAYERS_REFERENCE)])
        .await
        .unwrap();
    let orchestrator = PipelineOrchestrator::new(context.clone());

    let source =
        create_test_file(root.path(), "prayers-translation.txt", PRAYERS_TRANSLATION).unwrap();
    orchestrator.ingest(&[source.clone()]).await.unwrap();
    orchestrator.process().await.unwrap();

    let record = context
        .repository
        .find_translation_by_path(&source.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    let output_path = FileManager::grafted_output_path(
        &record.path,
        &context.config.output_dir,
        record.language.as_deref(),
    );
    std::fs::remove_file(&output_path).unwrap();

    let summary = orchestrator.export().await.unwrap();
    assert_eq!(summary.exported, 1);
    assert!(output_path.exists());
}

#[tokio::test]
async fn test_pipeline_processWithEmptyCatalogue_shouldFail() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[]).await.unwrap();
    let orchestrator = PipelineOrchestrator::new(context);

    assert!(orchestrator.process().await.is_err());
}
