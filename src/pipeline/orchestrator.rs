/*!
 * Pipeline orchestration.
 *
 * Three jobs: ingest (extract source files into fragment records),
 * process (match, align, validate, graft every extracted translation),
 * and export (re-graft output from persisted alignments, picking up
 * manual overrides and approvals). Each document is isolated: a failure
 * marks that document failed and the job carries on.
 */

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;

use crate::database::{AlignmentRecord, FragmentRecord, JobType, MatchRecord, TranslationRecord};
use crate::file_utils::FileManager;
use crate::fragments::{FragmentSource, TranslationDocument, TranslationFragment, TranslationStatus};
use crate::matching::MatchOutcome;
use crate::structure::{ReferenceDocument, StructureWriter};
use crate::validation::ReviewFlag;

use super::context::PipelineContext;

/// Outcome counts of an ingest job
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub job_id: String,
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome counts of a process job
#[derive(Debug, Default)]
pub struct ProcessSummary {
    pub job_id: String,
    pub matched: usize,
    pub unmatched: usize,
    pub failed: usize,
}

/// Outcome counts of an export job
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub job_id: String,
    pub exported: usize,
    pub skipped: usize,
}

pub struct PipelineOrchestrator {
    context: Arc<PipelineContext>,
}

impl PipelineOrchestrator {
    pub fn new(context: Arc<PipelineContext>) -> Self {
        Self { context }
    }

    /// Register and extract translation source files.
    ///
    /// A path already known with a non-failed status is skipped; failed
    /// documents are retried (the extraction cache makes retries cheap).
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<IngestSummary> {
        let registry = &self.context.registry;
        let job_id = registry.submit(JobType::Ingest, paths.len() as i64).await?;
        registry.start(&job_id).await?;

        match self.ingest_all(&job_id, paths).await {
            Ok(mut summary) => {
                registry.complete(&job_id).await?;
                summary.job_id = job_id;
                info!(
                    "Ingest complete: {} ingested, {} skipped, {} failed",
                    summary.ingested, summary.skipped, summary.failed
                );
                Ok(summary)
            }
            Err(e) => {
                self.mark_failed(&job_id, &e).await;
                Err(e)
            }
        }
    }

    async fn ingest_all(&self, job_id: &str, paths: &[PathBuf]) -> Result<IngestSummary> {
        let registry = &self.context.registry;
        let mut summary = IngestSummary::default();

        for (index, path) in paths.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            registry.tick(job_id, index as i64, Some(name)).await?;

            match self.ingest_one(path).await {
                Ok(true) => summary.ingested += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    error!("Ingest failed for {}: {:#}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }

        registry.tick(job_id, paths.len() as i64, None).await?;
        Ok(summary)
    }

    /// Record a terminal job failure; the last progress tick already
    /// names the item that was in flight.
    async fn mark_failed(&self, job_id: &str, error: &anyhow::Error) {
        if let Err(e) = self
            .context
            .registry
            .fail(job_id, &format!("{:#}", error))
            .await
        {
            warn!("Could not record failure of job {}: {:#}", job_id, e);
        }
    }

    /// Returns true if the document was (re)extracted, false if skipped.
    async fn ingest_one(&self, path: &PathBuf) -> Result<bool> {
        let path_str = path.to_string_lossy().into_owned();
        let existing = self.context.repository.find_translation_by_path(&path_str).await?;

        if let Some(record) = &existing {
            if record.status != TranslationStatus::Failed.to_string() {
                debug!(
                    "Skipping {} (already ingested, status {})",
                    path.display(),
                    record.status
                );
                return Ok(false);
            }
            info!("Retrying previously failed document {}", path.display());
        }

        let started = Instant::now();
        let extraction = self.context.extraction.extract(path).await;

        let raw = match extraction {
            Ok((raw, origin)) => {
                debug!(
                    "Extracted {} in {:.1}s ({:?})",
                    path.display(),
                    started.elapsed().as_secs_f64(),
                    origin
                );
                raw
            }
            Err(e) => {
                self.record_ingest_failure(path, &path_str, existing).await?;
                return Err(anyhow!(e).context("extraction tool failed"));
            }
        };

        let fragments = match FragmentSource::from_raw(&raw) {
            Ok(fragments) => fragments,
            Err(e) => {
                self.record_ingest_failure(path, &path_str, existing).await?;
                return Err(anyhow!(e).context("fragment normalization failed"));
            }
        };

        let mut document = TranslationDocument::new(path, fragments);
        if let Some(record) = existing {
            // Retried documents keep their identity across attempts
            document.id = record.id;
        }

        self.persist_extracted(&document).await?;
        let language = document
            .language
            .as_deref()
            .map(|code| crate::language_utils::language_name(code).unwrap_or(code))
            .unwrap_or("unknown");
        info!(
            "Ingested {} ({} fragments, language {})",
            path.display(),
            document.fragments.len(),
            language
        );
        Ok(true)
    }

    async fn persist_extracted(&self, document: &TranslationDocument) -> Result<()> {
        let repository = &self.context.repository;

        let mut record = TranslationRecord::new(
            document.id.clone(),
            document.path.to_string_lossy().into_owned(),
            document.filename(),
            document.language.clone(),
        );
        record.status = TranslationStatus::Extracted.to_string();

        if repository.get_translation(&document.id).await?.is_some() {
            repository
                .update_translation_status(&document.id, &record.status)
                .await?;
        } else {
            repository.create_translation(&record).await?;
        }

        let fragment_records = document
            .fragments
            .iter()
            .map(|f| FragmentRecord {
                id: 0,
                translation_id: document.id.clone(),
                seq_num: f.sequence_index as i64,
                text: f.text.clone(),
                page: f.page.map(|p| p as i64),
            })
            .collect();
        repository.insert_fragments(fragment_records).await
    }

    async fn record_ingest_failure(
        &self,
        path: &PathBuf,
        path_str: &str,
        existing: Option<TranslationRecord>,
    ) -> Result<()> {
        let repository = &self.context.repository;
        let failed = TranslationStatus::Failed.to_string();

        match existing {
            Some(record) => repository.update_translation_status(&record.id, &failed).await,
            None => {
                let mut record = TranslationRecord::new(
                    uuid::Uuid::new_v4().to_string(),
                    path_str.to_string(),
                    path.file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    None,
                );
                record.status = failed;
                repository.create_translation(&record).await
            }
        }
    }

    /// Match, align, validate, and graft every extracted translation.
    ///
    /// Documents run concurrently up to the configured limit; alignment
    /// within one document stays sequential.
    pub async fn process(&self) -> Result<ProcessSummary> {
        let repository = &self.context.repository;
        let registry = &self.context.registry;

        let pending = repository
            .list_translations(Some(TranslationStatus::Extracted.to_string()))
            .await?;

        let catalogue = Arc::new(self.context.catalogue().await);
        if catalogue.is_empty() {
            return Err(anyhow!("catalogue is empty; load it before processing"));
        }

        let job_id = registry.submit(JobType::Process, pending.len() as i64).await?;
        registry.start(&job_id).await?;
        info!(
            "Processing {} translations against {} references",
            pending.len(),
            catalogue.len()
        );

        match self.process_all(&job_id, pending, catalogue).await {
            Ok(mut summary) => {
                registry.complete(&job_id).await?;
                summary.job_id = job_id;
                info!(
                    "Process complete: {} matched, {} unmatched, {} failed",
                    summary.matched, summary.unmatched, summary.failed
                );
                Ok(summary)
            }
            Err(e) => {
                self.mark_failed(&job_id, &e).await;
                Err(e)
            }
        }
    }

    async fn process_all(
        &self,
        job_id: &str,
        pending: Vec<TranslationRecord>,
        catalogue: Arc<Vec<Arc<ReferenceDocument>>>,
    ) -> Result<ProcessSummary> {
        let registry = &self.context.registry;
        let semaphore = Arc::new(Semaphore::new(self.context.config.concurrency));
        let mut handles = Vec::with_capacity(pending.len());

        for record in pending {
            let context = Arc::clone(&self.context);
            let catalogue = Arc::clone(&catalogue);
            let semaphore = Arc::clone(&semaphore);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| anyhow!("worker pool closed"))?;
                let filename = record.filename.clone();
                let outcome = process_one(&context, &record, &catalogue).await;
                Ok::<_, anyhow::Error>((filename, outcome))
            }));
        }

        let mut summary = ProcessSummary::default();

        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            let (filename, outcome) = joined.context("pipeline worker task panicked")??;

            match outcome {
                Ok(TranslationStatus::Matched) => summary.matched += 1,
                Ok(TranslationStatus::Unmatched) => summary.unmatched += 1,
                Ok(status) => {
                    warn!("Unexpected terminal status {} for {}", status, filename);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Processing failed for {}: {:#}", filename, e);
                    summary.failed += 1;
                }
            }

            registry
                .tick(job_id, (index + 1) as i64, Some(filename))
                .await?;
        }

        Ok(summary)
    }

    /// Re-graft output for every matched translation from its persisted
    /// alignments. Overridden matches and approved alignments are taken
    /// as stored, so reviewer decisions land in the output.
    pub async fn export(&self) -> Result<ExportSummary> {
        let repository = &self.context.repository;
        let registry = &self.context.registry;

        let matched = repository
            .list_translations(Some(TranslationStatus::Matched.to_string()))
            .await?;

        let job_id = registry.submit(JobType::Export, matched.len() as i64).await?;
        registry.start(&job_id).await?;

        match self.export_all(&job_id, &matched).await {
            Ok(mut summary) => {
                registry.complete(&job_id).await?;
                summary.job_id = job_id;
                info!(
                    "Export complete: {} exported, {} skipped",
                    summary.exported, summary.skipped
                );
                Ok(summary)
            }
            Err(e) => {
                self.mark_failed(&job_id, &e).await;
                Err(e)
            }
        }
    }

    async fn export_all(&self, job_id: &str, matched: &[TranslationRecord]) -> Result<ExportSummary> {
        let registry = &self.context.registry;

        let filenames: HashMap<i64, String> = self
            .context
            .repository
            .list_references()
            .await?
            .into_iter()
            .map(|r| (r.id, r.filename))
            .collect();

        let mut summary = ExportSummary::default();

        for (index, record) in matched.iter().enumerate() {
            registry
                .tick(job_id, index as i64, Some(record.filename.clone()))
                .await?;

            match self.export_one(record, &filenames).await {
                Ok(true) => summary.exported += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    error!("Export failed for {}: {:#}", record.filename, e);
                    summary.skipped += 1;
                }
            }
        }

        registry.tick(job_id, matched.len() as i64, None).await?;
        Ok(summary)
    }

    async fn export_one(
        &self,
        record: &TranslationRecord,
        filenames: &HashMap<i64, String>,
    ) -> Result<bool> {
        let repository = &self.context.repository;

        let Some(match_record) = repository.get_match(&record.id).await? else {
            warn!("Matched translation {} has no match record", record.id);
            return Ok(false);
        };
        let Some(reference_id) = match_record.reference_id else {
            return Ok(false);
        };
        let Some(filename) = filenames.get(&reference_id) else {
            return Ok(false);
        };
        let Some(reference) = self.context.reference(filename).await else {
            warn!("Reference {} not present in the loaded catalogue", filename);
            return Ok(false);
        };

        let fragments = repository.get_fragments(&record.id).await?;
        let texts: HashMap<i64, &str> = fragments
            .iter()
            .map(|f| (f.seq_num, f.text.as_str()))
            .collect();

        let mut translations = HashMap::new();
        for alignment in repository.get_alignments(&record.id).await? {
            if let Some(text) = texts.get(&alignment.fragment_seq) {
                translations.insert(alignment.unit_id.clone(), text.to_string());
            }
        }

        if translations.is_empty() {
            return Ok(false);
        }

        self.write_grafted(&reference, &translations, record).await?;
        Ok(true)
    }

    async fn write_grafted(
        &self,
        reference: &ReferenceDocument,
        translations: &HashMap<String, String>,
        record: &TranslationRecord,
    ) -> Result<()> {
        let lock = self.context.write_lock(&reference.filename);
        let _guard = lock.lock().await;

        let (grafted, ambiguous) =
            StructureWriter::graft(&reference.document, &reference.units, translations)?;
        if ambiguous > 0 {
            warn!(
                "{} formatting runs left unplaced while grafting {}",
                ambiguous, record.filename
            );
        }

        let serialized = grafted.serialize()?;
        let output_path = FileManager::grafted_output_path(
            &record.path,
            &self.context.config.output_dir,
            record.language.as_deref(),
        );
        FileManager::write_to_file(&output_path, &serialized)?;
        info!("Wrote grafted output to {}", output_path.display());
        Ok(())
    }
}

/// Full per-document pipeline: match, align, validate, persist, graft.
async fn process_one(
    context: &PipelineContext,
    record: &TranslationRecord,
    catalogue: &[Arc<ReferenceDocument>],
) -> Result<TranslationStatus> {
    let repository = &context.repository;
    let started = Instant::now();

    let fragments: Vec<TranslationFragment> = repository
        .get_fragments(&record.id)
        .await?
        .into_iter()
        .map(|f| TranslationFragment {
            sequence_index: f.seq_num as usize,
            text: f.text,
            page: f.page.map(|p| p as u32),
        })
        .collect();

    if fragments.is_empty() {
        repository
            .update_translation_status(&record.id, &TranslationStatus::Failed.to_string())
            .await?;
        return Err(anyhow!("translation {} has no fragments", record.id));
    }

    let document = TranslationDocument {
        id: record.id.clone(),
        path: PathBuf::from(&record.path),
        language: record.language.clone(),
        fragments,
        status: TranslationStatus::Extracted,
    };

    let outcome = context.matcher.match_document(&document, catalogue).await;

    let matched = match outcome {
        MatchOutcome::Unmatched {
            best_score,
            best_reference,
            ..
        } => {
            let evidence = MatchRecord {
                id: 0,
                translation_id: record.id.clone(),
                reference_id: best_reference.as_deref().and_then(|f| context.reference_id(f)),
                score: best_score,
                tier: None,
                review_required: true,
                overridden: false,
                created_at: chrono::Utc::now().to_rfc3339(),
            };
            repository.upsert_match(&evidence).await?;
            repository
                .update_translation_status(&record.id, &TranslationStatus::Unmatched.to_string())
                .await?;
            return Ok(TranslationStatus::Unmatched);
        }
        MatchOutcome::Matched(matched) => matched,
    };

    let reference = context
        .reference(&matched.reference_filename)
        .await
        .ok_or_else(|| anyhow!("matched reference {} not loaded", matched.reference_filename))?;
    let reference_id = context
        .reference_id(&reference.filename)
        .ok_or_else(|| anyhow!("no stored id for reference {}", reference.filename))?;

    let match_record = MatchRecord {
        id: 0,
        translation_id: record.id.clone(),
        reference_id: Some(reference_id),
        score: matched.score,
        tier: Some(matched.tier.to_string()),
        review_required: matched.review_required,
        overridden: false,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    repository.upsert_match(&match_record).await?;

    let mut alignment_outcome = context.aligner.align(&document.fragments, &reference.units).await;
    context.flagger.validate(
        &mut alignment_outcome.alignments,
        &document.fragments,
        &reference.units,
    );

    // Probe each rewrite so runs that cannot be relocated surface as
    // review flags on the specific alignment, not just a global count.
    for alignment in &mut alignment_outcome.alignments {
        let (Some(unit), Some(fragment)) = (
            reference.units.get(alignment.unit_ordinal),
            document.fragments.get(alignment.fragment_index),
        ) else {
            continue;
        };
        let probe = StructureWriter::write(unit, &fragment.text);
        if !probe.is_clean() {
            alignment.flags.push(ReviewFlag::AmbiguousRuns {
                count: probe.ambiguous_runs,
            });
            alignment.tier = alignment.tier.demoted();
        }
    }

    let now = chrono::Utc::now().to_rfc3339();
    let alignment_records = alignment_outcome
        .alignments
        .iter()
        .map(|a| {
            Ok(AlignmentRecord {
                id: 0,
                translation_id: record.id.clone(),
                fragment_seq: a.fragment_index as i64,
                unit_id: a.unit_id.clone(),
                unit_ordinal: a.unit_ordinal as i64,
                score: a.score,
                tier: a.tier.to_string(),
                pass: a.pass as i64,
                flags: serde_json::to_string(&a.flags)?,
                approved: false,
                created_at: now.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    repository.upsert_alignments(alignment_records).await?;

    let translations: HashMap<String, String> = alignment_outcome
        .alignments
        .iter()
        .filter_map(|a| {
            document
                .fragments
                .get(a.fragment_index)
                .map(|f| (a.unit_id.clone(), f.text.clone()))
        })
        .collect();

    {
        let lock = context.write_lock(&reference.filename);
        let _guard = lock.lock().await;

        let (grafted, _ambiguous) =
            StructureWriter::graft(&reference.document, &reference.units, &translations)?;
        let serialized = grafted.serialize()?;
        let output_path = FileManager::grafted_output_path(
            &record.path,
            &context.config.output_dir,
            record.language.as_deref(),
        );
        FileManager::write_to_file(&output_path, &serialized)?;
    }

    repository
        .update_translation_status(&record.id, &TranslationStatus::Matched.to_string())
        .await?;

    info!(
        "Processed {} in {:.1}s: {} aligned, {} fragments left over, {} scoring calls",
        record.filename,
        started.elapsed().as_secs_f64(),
        alignment_outcome.alignments.len(),
        alignment_outcome.unmatched_fragments.len(),
        alignment_outcome.score_calls
    );
    Ok(TranslationStatus::Matched)
}
