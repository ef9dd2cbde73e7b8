/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for all database tables
 * and handles schema migrations for version upgrades.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // WAL for better concurrency and crash recovery
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // Catalogue of reference documents
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS reference_documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            filename TEXT NOT NULL,
            author TEXT,
            unit_count INTEGER NOT NULL DEFAULT 0,
            ingested_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_references_filename ON reference_documents(filename);
        "#,
    )?;

    // Extracted structural units, markup tree persisted as JSON
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS structural_units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference_id INTEGER NOT NULL REFERENCES reference_documents(id) ON DELETE CASCADE,
            unit_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            kind TEXT NOT NULL,
            plain_text TEXT NOT NULL,
            markup_tree TEXT NOT NULL,
            UNIQUE(reference_id, unit_id)
        );

        CREATE INDEX IF NOT EXISTS idx_units_reference ON structural_units(reference_id);
        "#,
    )?;

    // Ingested translation documents
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_documents (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            filename TEXT NOT NULL,
            language TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            fragment_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_translations_status ON translation_documents(status);
        "#,
    )?;

    // Ordered fragments belonging to a translation
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS fragments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            translation_id TEXT NOT NULL REFERENCES translation_documents(id) ON DELETE CASCADE,
            seq_num INTEGER NOT NULL,
            text TEXT NOT NULL,
            page INTEGER,
            UNIQUE(translation_id, seq_num)
        );

        CREATE INDEX IF NOT EXISTS idx_fragments_translation ON fragments(translation_id);
        "#,
    )?;

    // At most one match per translation; unmatched outcomes keep their
    // best-score evidence with a NULL reference
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS document_matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            translation_id TEXT NOT NULL UNIQUE REFERENCES translation_documents(id) ON DELETE CASCADE,
            reference_id INTEGER REFERENCES reference_documents(id) ON DELETE CASCADE,
            score REAL NOT NULL,
            tier TEXT,
            review_required INTEGER NOT NULL DEFAULT 0,
            overridden INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_matches_reference ON document_matches(reference_id);
        "#,
    )?;

    // At most one alignment per (translation, fragment); flags as JSON
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS alignments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            translation_id TEXT NOT NULL REFERENCES translation_documents(id) ON DELETE CASCADE,
            fragment_seq INTEGER NOT NULL,
            unit_id TEXT NOT NULL,
            unit_ordinal INTEGER NOT NULL,
            score REAL NOT NULL,
            tier TEXT NOT NULL,
            pass INTEGER NOT NULL,
            flags TEXT NOT NULL DEFAULT '[]',
            approved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE(translation_id, fragment_seq)
        );

        CREATE INDEX IF NOT EXISTS idx_alignments_translation ON alignments(translation_id);
        CREATE INDEX IF NOT EXISTS idx_alignments_tier ON alignments(tier);
        "#,
    )?;

    // Pipeline jobs with monotonic progress
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            job_type TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'pending',
            progress INTEGER NOT NULL DEFAULT 0,
            total INTEGER NOT NULL DEFAULT 0,
            current_item TEXT,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs(state);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    let current = from_version;

    while current < SCHEMA_VERSION {
        match current {
            // Add migration steps here as schema evolves
            _ => {
                return Err(anyhow::anyhow!(
                    "Unknown schema version: {}. Cannot migrate.",
                    current
                ));
            }
        }
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
