/*!
 * Manual review workflows: overridden matches and approved alignments
 * must survive automatic reprocessing untouched.
 */

use textgraft::fragments::TranslationStatus;
use textgraft::pipeline::PipelineOrchestrator;

use crate::common::{build_context, create_test_file, PRAYERS_REFERENCE, PRAYERS_TRANSLATION};

async fn processed_translation_id(
    context: &std::sync::Arc<textgraft::pipeline::PipelineContext>,
    orchestrator: &PipelineOrchestrator,
    root: &std::path::Path,
) -> String {
    let source = create_test_file(root, "prayers-translation.txt", PRAYERS_TRANSLATION).unwrap();
    orchestrator.ingest(&[source.clone()]).await.unwrap();
    orchestrator.process().await.unwrap();

    context
        .repository
        .find_translation_by_path(&source.to_string_lossy())
        .await
        .unwrap()
        .unwrap()
        .id
}

#[tokio::test]
async fn test_overriddenMatch_shouldSurviveReprocessing() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[("prayers-bahai.xml", PRAYERS_REFERENCE)])
        .await
        .unwrap();
    let orchestrator = PipelineOrchestrator::new(context.clone());
    let translation_id = processed_translation_id(&context, &orchestrator, root.path()).await;

    // A reviewer rejects the automatic match outright
    context
        .repository
        .override_match(&translation_id, None)
        .await
        .unwrap();

    context
        .repository
        .update_translation_status(&translation_id, &TranslationStatus::Extracted.to_string())
        .await
        .unwrap();
    orchestrator.process().await.unwrap();

    let match_record = context
        .repository
        .get_match(&translation_id)
        .await
        .unwrap()
        .unwrap();
    assert!(match_record.overridden);
    assert!(match_record.reference_id.is_none());
}

#[tokio::test]
async fn test_approvedAlignment_shouldSurviveReprocessing() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[("prayers-bahai.xml", PRAYERS_REFERENCE)])
        .await
        .unwrap();
    let orchestrator = PipelineOrchestrator::new(context.clone());
    let translation_id = processed_translation_id(&context, &orchestrator, root.path()).await;

    context
        .repository
        .approve_alignment(&translation_id, 0)
        .await
        .unwrap();

    context
        .repository
        .update_translation_status(&translation_id, &TranslationStatus::Extracted.to_string())
        .await
        .unwrap();
    orchestrator.process().await.unwrap();

    let alignments = context
        .repository
        .get_alignments(&translation_id)
        .await
        .unwrap();
    let approved = alignments.iter().find(|a| a.fragment_seq == 0).unwrap();
    assert!(approved.approved);
}

#[tokio::test]
async fn test_rejectAlignment_thenReprocess_shouldRecreateIt() {
    let root = crate::common::create_temp_dir().unwrap();
    let context = build_context(root.path(), &[("prayers-bahai.xml", PRAYERS_REFERENCE)])
        .await
        .unwrap();
    let orchestrator = PipelineOrchestrator::new(context.clone());
    let translation_id = processed_translation_id(&context, &orchestrator, root.path()).await;

    context
        .repository
        .reject_alignment(&translation_id, 0)
        .await
        .unwrap();
    assert_eq!(
        context
            .repository
            .get_alignments(&translation_id)
            .await
            .unwrap()
            .len(),
        2
    );

    // An un-approved rejection is advisory: the next automatic run may
    // realign the fragment
    context
        .repository
        .update_translation_status(&translation_id, &TranslationStatus::Extracted.to_string())
        .await
        .unwrap();
    orchestrator.process().await.unwrap();

    assert_eq!(
        context
            .repository
            .get_alignments(&translation_id)
            .await
            .unwrap()
            .len(),
        3
    );
}
