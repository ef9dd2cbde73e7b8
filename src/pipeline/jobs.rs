/*!
 * Job registry.
 *
 * Jobs live in an in-memory map guarded by a parking_lot RwLock and are
 * mirrored to the jobs table on every state change and progress tick, so
 * an external observer polling the store sees monotonically increasing
 * progress. State transitions are monotonic: progress never decreases
 * and a terminal state is never left.
 */

use std::collections::HashMap;

use anyhow::Result;
use log::{info, warn};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::database::{JobRecord, JobState, JobType, Repository};

pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobRecord>>,
    repository: Repository,
}

impl JobRegistry {
    pub fn new(repository: Repository) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            repository,
        }
    }

    /// Create a pending job and persist it. Returns the job id.
    pub async fn submit(&self, job_type: JobType, total: i64) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let record = JobRecord::new(id.clone(), job_type, total);

        self.repository.create_job(&record).await?;
        self.jobs.write().insert(id.clone(), record);

        info!("Submitted {} job {}", job_type, id);
        Ok(id)
    }

    /// Transition a job to running
    pub async fn start(&self, job_id: &str) -> Result<()> {
        self.transition(job_id, JobState::Running, None).await
    }

    /// Advance progress and persist the tick. Decreasing values are
    /// ignored rather than rewound.
    pub async fn tick(
        &self,
        job_id: &str,
        progress: i64,
        current_item: Option<String>,
    ) -> Result<()> {
        let total = {
            let mut jobs = self.jobs.write();
            let Some(job) = jobs.get_mut(job_id) else {
                warn!("Progress tick for unknown job {}", job_id);
                return Ok(());
            };
            job.progress = job.progress.max(progress);
            if let Some(item) = &current_item {
                job.current_item = Some(item.clone());
            }
            job.total
        };

        self.repository
            .update_job_progress(job_id, progress, total, current_item)
            .await
    }

    /// Mark a job completed
    pub async fn complete(&self, job_id: &str) -> Result<()> {
        self.transition(job_id, JobState::Completed, None).await
    }

    /// Mark a job failed. The message records the item being processed
    /// when the failure happened.
    pub async fn fail(&self, job_id: &str, error: &str) -> Result<()> {
        let message = {
            let jobs = self.jobs.read();
            match jobs.get(job_id).and_then(|j| j.current_item.clone()) {
                Some(item) => format!("failed while processing '{}': {}", item, error),
                None => error.to_string(),
            }
        };
        self.transition(job_id, JobState::Failed, Some(message))
            .await
    }

    /// In-memory snapshot of a job
    pub fn snapshot(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Demote running jobs left over from a previous process; called once
    /// at startup
    pub async fn recover(&self) -> Result<i64> {
        let recovered = self.repository.recover_stale_jobs().await?;
        if recovered > 0 {
            info!("Recovered {} interrupted job(s)", recovered);
        }
        Ok(recovered)
    }

    async fn transition(
        &self,
        job_id: &str,
        state: JobState,
        error: Option<String>,
    ) -> Result<()> {
        {
            let mut jobs = self.jobs.write();
            if let Some(job) = jobs.get_mut(job_id) {
                if job.state.is_terminal() {
                    warn!(
                        "Ignoring transition of terminal job {} to {}",
                        job_id, state
                    );
                    return Ok(());
                }
                job.state = state;
                job.error = error.clone();
            }
        }

        self.repository.set_job_state(job_id, state, error).await
    }
}
