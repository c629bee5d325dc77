//! Storage traits and error types
//!
//! This module defines the trait interfaces for storage backends and
//! associated error types.

use crate::model::{
    Authority, Decision, DecisionFields, NewAuthority, ProcedureKind, SubjectArea,
};
use crate::storage::{CategoryCounts, FailureRecord, RunRecord, UpsertOutcome};
use crate::FailureKind;
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Decision not found: {0}")]
    DecisionNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Placeholder authority missing from the authorities table")]
    SentinelMissing,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence of decisions and crawl bookkeeping
///
/// Implementations are shared behind a mutex by the coordinator, so every
/// write is serialised; `upsert_decision` must be atomic.
pub trait RecordStore {
    // ===== Decisions =====

    /// Returns true if a decision with this ECLI is stored
    fn exists(&self, ecli: &str) -> StorageResult<bool>;

    /// Creates or updates a decision
    ///
    /// Scalar fields are overwritten. Subject-area and procedure-kind links
    /// are added to the existing ones; no link is ever removed. The analysis
    /// metadata map is left untouched.
    ///
    /// # Arguments
    ///
    /// * `fields` - Scalar fields, including the ECLI
    /// * `authority` - The issuing authority (possibly the placeholder)
    /// * `subject_areas` - Subject areas to link
    /// * `procedure_kinds` - Procedure kinds to link
    fn upsert_decision(
        &mut self,
        fields: &DecisionFields,
        authority: &Authority,
        subject_areas: &[SubjectArea],
        procedure_kinds: &[ProcedureKind],
    ) -> StorageResult<UpsertOutcome>;

    /// Gets a decision with its authority and links
    fn get_decision(&self, ecli: &str) -> StorageResult<Option<Decision>>;

    /// Stores the result of an analysis job under `job_id` in the metadata map
    fn set_metadata(&mut self, ecli: &str, job_id: &str, value: Value) -> StorageResult<()>;

    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&mut self, category: &str, since: NaiveDate, config_hash: &str)
        -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    fn get_recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// Records a failed item for a run
    fn record_failure(
        &mut self,
        run_id: i64,
        ecli: &str,
        kind: FailureKind,
        message: &str,
    ) -> StorageResult<()>;

    /// Gets all failures recorded for a run
    fn get_failures(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>>;

    /// Marks a run as finished and stores its counters
    fn finish_run(&mut self, run: &RunRecord) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts all stored decisions
    fn count_decisions(&self) -> StorageResult<u64>;

    /// Counts decisions per authority category
    fn count_decisions_by_category(&self) -> StorageResult<Vec<CategoryCounts>>;
}

/// Read access to the controlled vocabularies, plus the insert contract used
/// by the vocabulary import jobs
pub trait VocabularyStore {
    /// Finds an authority by its exact name
    fn find_authority_by_name(&self, name: &str) -> StorageResult<Option<Authority>>;

    /// Gets the placeholder authority
    fn sentinel_authority(&self) -> StorageResult<Authority>;

    /// Gets all authorities of a category, excluding the placeholder
    fn authorities_by_category(&self, category: &str) -> StorageResult<Vec<Authority>>;

    /// Gets all distinct authority categories, excluding the placeholder's
    fn categories(&self) -> StorageResult<Vec<String>>;

    /// Gets every authority, including the placeholder
    fn all_authorities(&self) -> StorageResult<Vec<Authority>>;

    /// Gets every subject area
    fn all_subject_areas(&self) -> StorageResult<Vec<SubjectArea>>;

    /// Gets every procedure kind
    fn all_procedure_kinds(&self) -> StorageResult<Vec<ProcedureKind>>;

    /// Inserts or updates an authority by name
    fn upsert_authority(&mut self, authority: &NewAuthority) -> StorageResult<Authority>;

    /// Inserts or updates a subject area by identifier
    fn upsert_subject_area(&mut self, name: &str, identifier: &str) -> StorageResult<SubjectArea>;

    /// Inserts or updates a procedure kind by identifier
    fn upsert_procedure_kind(
        &mut self,
        name: &str,
        identifier: &str,
    ) -> StorageResult<ProcedureKind>;
}
