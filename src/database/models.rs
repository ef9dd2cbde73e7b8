/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline job type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Ingest a translation source file (extraction + fragment storage)
    Ingest,
    /// Full pipeline over pending translations
    Process,
    /// Re-serialize grafted output documents
    Export,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::Ingest => write!(f, "ingest"),
            JobType::Process => write!(f, "process"),
            JobType::Export => write!(f, "export"),
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ingest" => Ok(JobType::Ingest),
            "process" => Ok(JobType::Process),
            "export" => Ok(JobType::Export),
            _ => Err(anyhow::anyhow!("Invalid job type: {}", s)),
        }
    }
}

/// Pipeline job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Submitted, not yet picked up by a worker
    Pending,
    /// Actively being processed
    Running,
    /// Terminal: finished successfully
    Completed,
    /// Terminal: failed with an error message
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            _ => Err(anyhow::anyhow!("Invalid job state: {}", s)),
        }
    }
}

/// Catalogued reference document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Database ID
    pub id: i64,
    /// Absolute path to the source XML file
    pub path: String,
    /// Basename, used for title matching
    pub filename: String,
    /// Author, when the document declares one
    pub author: Option<String>,
    /// Number of extracted structural units
    pub unit_count: i64,
    /// Ingestion timestamp (ISO 8601)
    pub ingested_at: String,
}

impl ReferenceRecord {
    /// Create a record for a newly catalogued document (without DB id)
    pub fn new(path: String, filename: String, author: Option<String>, unit_count: i64) -> Self {
        Self {
            id: 0,
            path,
            filename,
            author,
            unit_count,
            ingested_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Persisted structural unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: i64,
    pub reference_id: i64,
    /// Stable unit identifier within its document
    pub unit_id: String,
    /// Document-order rank
    pub ordinal: i64,
    pub kind: String,
    pub plain_text: String,
    /// JSON-serialized markup tree
    pub markup_tree: String,
}

/// Persisted translation document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// UUID
    pub id: String,
    pub path: String,
    pub filename: String,
    /// Detected ISO 639 language code
    pub language: Option<String>,
    /// Lifecycle status string (pending/extracted/matched/unmatched/failed)
    pub status: String,
    pub fragment_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TranslationRecord {
    pub fn new(id: String, path: String, filename: String, language: Option<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            path,
            filename,
            language,
            status: "pending".to_string(),
            fragment_count: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Persisted fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentRecord {
    pub id: i64,
    pub translation_id: String,
    pub seq_num: i64,
    pub text: String,
    pub page: Option<i64>,
}

/// Persisted document match; `reference_id` is NULL for an unmatched
/// outcome recorded with its best-score evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: i64,
    pub translation_id: String,
    pub reference_id: Option<i64>,
    pub score: f64,
    pub tier: Option<String>,
    pub review_required: bool,
    /// Set when a human rejected or replaced the automatic decision
    pub overridden: bool,
    pub created_at: String,
}

/// Persisted alignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub id: i64,
    pub translation_id: String,
    pub fragment_seq: i64,
    pub unit_id: String,
    pub unit_ordinal: i64,
    pub score: f64,
    pub tier: String,
    pub pass: i64,
    /// JSON-serialized review flags
    pub flags: String,
    pub approved: bool,
    pub created_at: String,
}

/// Persisted pipeline job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// UUID
    pub id: String,
    pub job_type: JobType,
    pub state: JobState,
    pub progress: i64,
    pub total: i64,
    /// Item being processed; included in error messages on failure
    pub current_item: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRecord {
    pub fn new(id: String, job_type: JobType, total: i64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            job_type,
            state: JobState::Pending,
            progress: 0,
            total,
            current_item: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Completion percentage for display
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.progress as f64 / self.total as f64) * 100.0
    }
}
