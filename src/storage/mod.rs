//! Storage module for persisting decisions
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Idempotent decision upserts with append-only vocabulary links
//! - Vocabulary lookups for reference resolution
//! - Run tracking and per-item failure records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{RecordStore, StorageError, StorageResult, VocabularyStore};

use crate::model::Decision;
use crate::{CrawlError, FailureKind};
use chrono::NaiveDate;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(CrawlError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CrawlError> {
    SqliteStorage::new(path)
}

/// Result of a decision upsert
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub decision: Decision,
    /// True if the decision did not exist before
    pub created: bool,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub category: String,
    pub since: NaiveDate,
    pub config_hash: String,
    pub status: RunStatus,
    pub discovered: u64,
    pub stored: u64,
    pub skipped: u64,
    pub failed: u64,
    pub authority_fallbacks: u64,
}

/// A failed item recorded during a run
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub run_id: i64,
    pub ecli: String,
    pub kind: FailureKind,
    pub message: String,
    pub recorded_at: String,
}

/// Decision counts for one authority category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCounts {
    pub category: String,
    pub total: u64,
    /// Decisions with a non-empty body
    pub with_text: u64,
    /// Decisions with at least one analysis result
    pub with_metadata: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Every authority was discovered; individual items may have failed
    Completed,
    /// Discovery failed for at least one authority
    Partial,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
