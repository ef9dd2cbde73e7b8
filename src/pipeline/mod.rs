/*!
 * Pipeline layer: shared context, job registry, and the orchestrator
 * that drives ingest, process, and export runs.
 */

pub mod context;
pub mod jobs;
pub mod orchestrator;

pub use context::PipelineContext;
pub use jobs::JobRegistry;
pub use orchestrator::{ExportSummary, IngestSummary, PipelineOrchestrator, ProcessSummary};
