/*!
 * Ingest flow: external extraction through fragment persistence.
 */

use textgraft::fragments::TranslationStatus;
use textgraft::pipeline::PipelineOrchestrator;

use crate::common::{build_context, create_test_file};

#[tokio::test]
async fn test_ingest_plainTextSource_shouldPersistFragments() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[]).await.unwrap();
    let orchestrator = PipelineOrchestrator::new(context.clone());

    let source = create_test_file(
        root.path(),
        "letter.txt",
        "First paragraph of the letter.\n\nSecond paragraph of the letter.",
    )
    .unwrap();

    let summary = orchestrator.ingest(&[source.clone()]).await.unwrap();
    assert_eq!(summary.ingested, 1);
    assert_eq!(summary.failed, 0);

    let record = context
        .repository
        .find_translation_by_path(&source.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TranslationStatus::Extracted.to_string());
    assert_eq!(record.fragment_count, 2);

    let fragments = context.repository.get_fragments(&record.id).await.unwrap();
    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[0].text, "First paragraph of the letter.");
}

#[tokio::test]
async fn test_ingest_secondRun_shouldSkipExistingDocuments() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[]).await.unwrap();
    let orchestrator = PipelineOrchestrator::new(context);

    let source = create_test_file(root.path(), "letter.txt", "Some content.").unwrap();

    orchestrator.ingest(&[source.clone()]).await.unwrap();
    let summary = orchestrator.ingest(&[source]).await.unwrap();

    assert_eq!(summary.ingested, 0);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_ingest_missingSource_shouldRecordFailedDocument() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[]).await.unwrap();
    let orchestrator = PipelineOrchestrator::new(context.clone());

    let missing = root.path().join("not-there.pdf");
    let summary = orchestrator.ingest(&[missing.clone()]).await.unwrap();

    assert_eq!(summary.failed, 1);
    let record = context
        .repository
        .find_translation_by_path(&missing.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TranslationStatus::Failed.to_string());
}

#[tokio::test]
async fn test_ingest_failedDocument_shouldBeRetriedKeepingIdentity() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[]).await.unwrap();
    let orchestrator = PipelineOrchestrator::new(context.clone());

    let source = root.path().join("late.txt");
    orchestrator.ingest(&[source.clone()]).await.unwrap();

    let failed = context
        .repository
        .find_translation_by_path(&source.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, TranslationStatus::Failed.to_string());

    // The file shows up; the next ingest run retries it
    std::fs::write(&source, "Now the content exists.").unwrap();
    let summary = orchestrator.ingest(&[source.clone()]).await.unwrap();
    assert_eq!(summary.ingested, 1);

    let retried = context
        .repository
        .find_translation_by_path(&source.to_string_lossy())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retried.id, failed.id);
    assert_eq!(retried.status, TranslationStatus::Extracted.to_string());
}
