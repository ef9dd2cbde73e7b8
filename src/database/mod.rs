/*!
 * Persistence layer.
 *
 * SQLite-backed record store for the catalogue, translations, matches,
 * alignments, and pipeline jobs.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::{DatabaseConnection, DatabaseStats};
pub use models::{
    AlignmentRecord, FragmentRecord, JobRecord, JobState, JobType, MatchRecord, ReferenceRecord,
    TranslationRecord, UnitRecord,
};
pub use repository::Repository;
