/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 * Every write is a single-entity upsert; the core never assumes
 * multi-row transactional guarantees beyond batch inserts.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, OptionalExtension, Row};

use super::connection::DatabaseConnection;
use super::models::{
    AlignmentRecord, FragmentRecord, JobRecord, JobState, MatchRecord, ReferenceRecord,
    TranslationRecord, UnitRecord,
};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Access the underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Reference Document Operations
    // =========================================================================

    /// Insert a reference document, returning its database id
    pub async fn insert_reference(&self, reference: &ReferenceRecord) -> Result<i64> {
        let reference = reference.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO reference_documents (path, filename, author, unit_count, ingested_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        reference.path,
                        reference.filename,
                        reference.author,
                        reference.unit_count,
                        reference.ingested_at,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Get a reference document by its source path
    pub async fn get_reference_by_path(&self, path: &str) -> Result<Option<ReferenceRecord>> {
        let path = path.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        "SELECT id, path, filename, author, unit_count, ingested_at
                         FROM reference_documents WHERE path = ?1",
                        [&path],
                        parse_reference_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// List all catalogued reference documents
    pub async fn list_references(&self) -> Result<Vec<ReferenceRecord>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, path, filename, author, unit_count, ingested_at
                     FROM reference_documents ORDER BY filename",
                )?;
                let rows = stmt.query_map([], parse_reference_row)?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            })
            .await
    }

    /// Replace all structural units for a reference (batch insert)
    pub async fn insert_units(&self, reference_id: i64, units: Vec<UnitRecord>) -> Result<()> {
        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    "DELETE FROM structural_units WHERE reference_id = ?1",
                    [reference_id],
                )?;
                let count = units.len() as i64;
                for unit in units {
                    tx.execute(
                        r#"
                        INSERT INTO structural_units
                            (reference_id, unit_id, ordinal, kind, plain_text, markup_tree)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                        "#,
                        params![
                            reference_id,
                            unit.unit_id,
                            unit.ordinal,
                            unit.kind,
                            unit.plain_text,
                            unit.markup_tree,
                        ],
                    )?;
                }
                tx.execute(
                    "UPDATE reference_documents SET unit_count = ?1 WHERE id = ?2",
                    params![count, reference_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Get all structural units for a reference, in document order
    pub async fn get_units(&self, reference_id: i64) -> Result<Vec<UnitRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, reference_id, unit_id, ordinal, kind, plain_text, markup_tree
                     FROM structural_units WHERE reference_id = ?1 ORDER BY ordinal",
                )?;
                let rows = stmt.query_map([reference_id], |row| {
                    Ok(UnitRecord {
                        id: row.get(0)?,
                        reference_id: row.get(1)?,
                        unit_id: row.get(2)?,
                        ordinal: row.get(3)?,
                        kind: row.get(4)?,
                        plain_text: row.get(5)?,
                        markup_tree: row.get(6)?,
                    })
                })?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            })
            .await
    }

    // =========================================================================
    // Translation Document Operations
    // =========================================================================

    /// Create a translation document record
    pub async fn create_translation(&self, translation: &TranslationRecord) -> Result<()> {
        let translation = translation.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_documents
                        (id, path, filename, language, status, fragment_count, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                    params![
                        translation.id,
                        translation.path,
                        translation.filename,
                        translation.language,
                        translation.status,
                        translation.fragment_count,
                        translation.created_at,
                        translation.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a translation document by id
    pub async fn get_translation(&self, id: &str) -> Result<Option<TranslationRecord>> {
        let id = id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        "SELECT id, path, filename, language, status, fragment_count, created_at, updated_at
                         FROM translation_documents WHERE id = ?1",
                        [&id],
                        parse_translation_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// Find a translation by its source path (skip-if-present ingestion)
    pub async fn find_translation_by_path(
        &self,
        path: &str,
    ) -> Result<Option<TranslationRecord>> {
        let path = path.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        "SELECT id, path, filename, language, status, fragment_count, created_at, updated_at
                         FROM translation_documents WHERE path = ?1
                         ORDER BY created_at DESC LIMIT 1",
                        [&path],
                        parse_translation_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// List translations, optionally filtered by status
    pub async fn list_translations(
        &self,
        status_filter: Option<String>,
    ) -> Result<Vec<TranslationRecord>> {
        self.db
            .execute_async(move |conn| {
                let translations: Vec<TranslationRecord> = if let Some(status) = status_filter {
                    let mut stmt = conn.prepare(
                        "SELECT id, path, filename, language, status, fragment_count, created_at, updated_at
                         FROM translation_documents WHERE status = ?1 ORDER BY created_at",
                    )?;
                    stmt.query_map([status], parse_translation_row)?
                        .filter_map(|r| r.ok())
                        .collect()
                } else {
                    let mut stmt = conn.prepare(
                        "SELECT id, path, filename, language, status, fragment_count, created_at, updated_at
                         FROM translation_documents ORDER BY created_at",
                    )?;
                    stmt.query_map([], parse_translation_row)?
                        .filter_map(|r| r.ok())
                        .collect()
                };
                Ok(translations)
            })
            .await
    }

    /// Update a translation's lifecycle status
    pub async fn update_translation_status(&self, id: &str, status: &str) -> Result<()> {
        let id = id.to_string();
        let status = status.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE translation_documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status, now, id],
                )?;
                Ok(())
            })
            .await
    }

    /// Count translations per lifecycle status
    pub async fn count_translations_by_status(&self) -> Result<Vec<(String, i64)>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT status, COUNT(*) FROM translation_documents GROUP BY status ORDER BY status",
                )?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            })
            .await
    }

    /// Insert fragments for a translation, replacing any previous
    /// extraction of the same document
    pub async fn insert_fragments(&self, fragments: Vec<FragmentRecord>) -> Result<()> {
        self.db
            .transaction_async(move |tx| {
                if let Some(first) = fragments.first() {
                    tx.execute(
                        "DELETE FROM fragments WHERE translation_id = ?1",
                        [&first.translation_id],
                    )?;
                }
                for fragment in &fragments {
                    tx.execute(
                        "INSERT INTO fragments (translation_id, seq_num, text, page)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![
                            fragment.translation_id,
                            fragment.seq_num,
                            fragment.text,
                            fragment.page,
                        ],
                    )?;
                }
                if let Some(first) = fragments.first() {
                    tx.execute(
                        "UPDATE translation_documents SET fragment_count = ?1 WHERE id = ?2",
                        params![fragments.len() as i64, first.translation_id],
                    )?;
                }
                Ok(())
            })
            .await
    }

    /// Get all fragments for a translation, in sequence order
    pub async fn get_fragments(&self, translation_id: &str) -> Result<Vec<FragmentRecord>> {
        let translation_id = translation_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, translation_id, seq_num, text, page
                     FROM fragments WHERE translation_id = ?1 ORDER BY seq_num",
                )?;
                let rows = stmt.query_map([&translation_id], |row| {
                    Ok(FragmentRecord {
                        id: row.get(0)?,
                        translation_id: row.get(1)?,
                        seq_num: row.get(2)?,
                        text: row.get(3)?,
                        page: row.get(4)?,
                    })
                })?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            })
            .await
    }

    // =========================================================================
    // Document Match Operations
    // =========================================================================

    /// Upsert the match decision for a translation. A manually overridden
    /// match is never replaced by an automatic re-run.
    pub async fn upsert_match(&self, record: &MatchRecord) -> Result<()> {
        let record = record.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO document_matches
                        (translation_id, reference_id, score, tier, review_required, overridden, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(translation_id) DO UPDATE SET
                        reference_id = excluded.reference_id,
                        score = excluded.score,
                        tier = excluded.tier,
                        review_required = excluded.review_required,
                        created_at = excluded.created_at
                    WHERE document_matches.overridden = 0
                    "#,
                    params![
                        record.translation_id,
                        record.reference_id,
                        record.score,
                        record.tier,
                        record.review_required as i64,
                        record.overridden as i64,
                        record.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get the match decision for a translation
    pub async fn get_match(&self, translation_id: &str) -> Result<Option<MatchRecord>> {
        let translation_id = translation_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        "SELECT id, translation_id, reference_id, score, tier, review_required, overridden, created_at
                         FROM document_matches WHERE translation_id = ?1",
                        [&translation_id],
                        parse_match_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// Manually override a match: point it at another reference (or none)
    /// and protect it from automatic replacement
    pub async fn override_match(
        &self,
        translation_id: &str,
        reference_id: Option<i64>,
    ) -> Result<()> {
        let translation_id = translation_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    UPDATE document_matches
                    SET reference_id = ?1, overridden = 1, review_required = 0, created_at = ?2
                    WHERE translation_id = ?3
                    "#,
                    params![reference_id, now, translation_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Count matches per confidence tier
    pub async fn count_matches_by_tier(&self) -> Result<Vec<(String, i64)>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT COALESCE(tier, 'unmatched'), COUNT(*)
                     FROM document_matches GROUP BY tier ORDER BY tier",
                )?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            })
            .await
    }

    // =========================================================================
    // Alignment Operations
    // =========================================================================

    /// Upsert alignments for a translation. Approved alignments are
    /// immutable: the upsert leaves them untouched.
    pub async fn upsert_alignments(&self, records: Vec<AlignmentRecord>) -> Result<()> {
        self.db
            .transaction_async(move |tx| {
                for record in records {
                    tx.execute(
                        r#"
                        INSERT INTO alignments
                            (translation_id, fragment_seq, unit_id, unit_ordinal, score, tier, pass, flags, approved, created_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                        ON CONFLICT(translation_id, fragment_seq) DO UPDATE SET
                            unit_id = excluded.unit_id,
                            unit_ordinal = excluded.unit_ordinal,
                            score = excluded.score,
                            tier = excluded.tier,
                            pass = excluded.pass,
                            flags = excluded.flags,
                            created_at = excluded.created_at
                        WHERE alignments.approved = 0
                        "#,
                        params![
                            record.translation_id,
                            record.fragment_seq,
                            record.unit_id,
                            record.unit_ordinal,
                            record.score,
                            record.tier,
                            record.pass,
                            record.flags,
                            record.approved as i64,
                            record.created_at,
                        ],
                    )?;
                }
                Ok(())
            })
            .await
    }

    /// Get all alignments for a translation, in fragment order
    pub async fn get_alignments(&self, translation_id: &str) -> Result<Vec<AlignmentRecord>> {
        let translation_id = translation_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, translation_id, fragment_seq, unit_id, unit_ordinal, score, tier, pass, flags, approved, created_at
                     FROM alignments WHERE translation_id = ?1 ORDER BY fragment_seq",
                )?;
                let rows = stmt.query_map([&translation_id], parse_alignment_row)?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            })
            .await
    }

    /// Approve one alignment, making it immutable
    pub async fn approve_alignment(&self, translation_id: &str, fragment_seq: i64) -> Result<()> {
        let translation_id = translation_id.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE alignments SET approved = 1
                     WHERE translation_id = ?1 AND fragment_seq = ?2",
                    params![translation_id, fragment_seq],
                )?;
                Ok(())
            })
            .await
    }

    /// Reject one alignment. Deletion clears the approved state too: a
    /// rejected alignment is replaceable on the next run.
    pub async fn reject_alignment(&self, translation_id: &str, fragment_seq: i64) -> Result<()> {
        let translation_id = translation_id.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM alignments
                     WHERE translation_id = ?1 AND fragment_seq = ?2",
                    params![translation_id, fragment_seq],
                )?;
                debug!("Rejected {} alignment(s)", deleted);
                Ok(())
            })
            .await
    }

    /// Count alignments per confidence tier
    pub async fn count_alignments_by_tier(&self) -> Result<Vec<(String, i64)>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT tier, COUNT(*) FROM alignments GROUP BY tier ORDER BY tier",
                )?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            })
            .await
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Create a job record
    pub async fn create_job(&self, job: &JobRecord) -> Result<()> {
        let job = job.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO jobs (id, job_type, state, progress, total, current_item, error, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                    params![
                        job.id,
                        job.job_type.to_string(),
                        job.state.to_string(),
                        job.progress,
                        job.total,
                        job.current_item,
                        job.error,
                        job.created_at,
                        job.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Update job progress. MAX keeps the persisted value monotonic even
    /// under out-of-order ticks.
    pub async fn update_job_progress(
        &self,
        job_id: &str,
        progress: i64,
        total: i64,
        current_item: Option<String>,
    ) -> Result<()> {
        let job_id = job_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    UPDATE jobs
                    SET progress = MAX(progress, ?1), total = ?2,
                        current_item = COALESCE(?3, current_item), updated_at = ?4
                    WHERE id = ?5
                    "#,
                    params![progress, total, current_item, now, job_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Transition a job's state; terminal states carry an optional error
    pub async fn set_job_state(
        &self,
        job_id: &str,
        state: JobState,
        error: Option<String>,
    ) -> Result<()> {
        let job_id = job_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "UPDATE jobs SET state = ?1, error = ?2, updated_at = ?3 WHERE id = ?4",
                    params![state.to_string(), error, now, job_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a job by id
    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        "SELECT id, job_type, state, progress, total, current_item, error, created_at, updated_at
                         FROM jobs WHERE id = ?1",
                        [&job_id],
                        parse_job_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// List jobs, newest first, optionally filtered by state
    pub async fn list_jobs(&self, state_filter: Option<JobState>) -> Result<Vec<JobRecord>> {
        self.db
            .execute_async(move |conn| {
                let jobs: Vec<JobRecord> = if let Some(state) = state_filter {
                    let mut stmt = conn.prepare(
                        "SELECT id, job_type, state, progress, total, current_item, error, created_at, updated_at
                         FROM jobs WHERE state = ?1 ORDER BY created_at DESC",
                    )?;
                    stmt.query_map([state.to_string()], parse_job_row)?
                        .filter_map(|r| r.ok())
                        .collect()
                } else {
                    let mut stmt = conn.prepare(
                        "SELECT id, job_type, state, progress, total, current_item, error, created_at, updated_at
                         FROM jobs ORDER BY created_at DESC",
                    )?;
                    stmt.query_map([], parse_job_row)?
                        .filter_map(|r| r.ok())
                        .collect()
                };
                Ok(jobs)
            })
            .await
    }

    /// Demote jobs left in the running state by a previous process to
    /// failed; called once at startup. Returns the number recovered.
    pub async fn recover_stale_jobs(&self) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let recovered = conn.execute(
                    "UPDATE jobs SET state = 'failed', error = 'interrupted by process restart', updated_at = ?1
                     WHERE state = 'running'",
                    [&now],
                )?;
                Ok(recovered as i64)
            })
            .await
    }
}

fn parse_reference_row(row: &Row) -> rusqlite::Result<ReferenceRecord> {
    Ok(ReferenceRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        filename: row.get(2)?,
        author: row.get(3)?,
        unit_count: row.get(4)?,
        ingested_at: row.get(5)?,
    })
}

fn parse_translation_row(row: &Row) -> rusqlite::Result<TranslationRecord> {
    Ok(TranslationRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        filename: row.get(2)?,
        language: row.get(3)?,
        status: row.get(4)?,
        fragment_count: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn parse_match_row(row: &Row) -> rusqlite::Result<MatchRecord> {
    Ok(MatchRecord {
        id: row.get(0)?,
        translation_id: row.get(1)?,
        reference_id: row.get(2)?,
        score: row.get(3)?,
        tier: row.get(4)?,
        review_required: row.get::<_, i64>(5)? != 0,
        overridden: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
    })
}

fn parse_alignment_row(row: &Row) -> rusqlite::Result<AlignmentRecord> {
    Ok(AlignmentRecord {
        id: row.get(0)?,
        translation_id: row.get(1)?,
        fragment_seq: row.get(2)?,
        unit_id: row.get(3)?,
        unit_ordinal: row.get(4)?,
        score: row.get(5)?,
        tier: row.get(6)?,
        pass: row.get(7)?,
        flags: row.get(8)?,
        approved: row.get::<_, i64>(9)? != 0,
        created_at: row.get(10)?,
    })
}

fn parse_job_row(row: &Row) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        job_type: row
            .get::<_, String>(1)?
            .parse()
            .unwrap_or(super::models::JobType::Process),
        state: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(JobState::Failed),
        progress: row.get(3)?,
        total: row.get(4)?,
        current_item: row.get(5)?,
        error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
