//! Statistics generation from the decision database
//!
//! This module provides functionality for extracting and displaying
//! decision counts and recent crawl runs from the storage layer.

use crate::storage::{CategoryCounts, RecordStore, RunRecord};
use crate::Result;
use std::fmt::Write;

/// Number of runs shown in the statistics
const RECENT_RUNS: usize = 5;

/// Database statistics summary
#[derive(Debug, Clone)]
pub struct DatabaseStatistics {
    /// Total number of stored decisions
    pub total_decisions: u64,

    /// Counts per authority category, sorted by category
    pub by_category: Vec<CategoryCounts>,

    /// Most recent crawl runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

impl DatabaseStatistics {
    pub fn total_with_text(&self) -> u64 {
        self.by_category.iter().map(|c| c.with_text).sum()
    }

    pub fn total_with_metadata(&self) -> u64 {
        self.by_category.iter().map(|c| c.with_metadata).sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(DatabaseStatistics)` - Successfully loaded statistics
/// * `Err(CrawlError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn RecordStore) -> Result<DatabaseStatistics> {
    let total_decisions = storage.count_decisions()?;
    let by_category = storage.count_decisions_by_category()?;
    let recent_runs = storage.get_recent_runs(RECENT_RUNS)?;

    Ok(DatabaseStatistics {
        total_decisions,
        by_category,
        recent_runs,
    })
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Formats statistics as plain text
pub fn format_statistics(stats: &DatabaseStatistics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Decision Statistics ===\n");
    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Total decisions: {}", stats.total_decisions);
    let _ = writeln!(
        out,
        "  With text: {} ({:.1}%)",
        stats.total_with_text(),
        percentage(stats.total_with_text(), stats.total_decisions)
    );
    let _ = writeln!(
        out,
        "  With analysis metadata: {}",
        stats.total_with_metadata()
    );
    let _ = writeln!(out);

    if !stats.by_category.is_empty() {
        let _ = writeln!(out, "By Authority Category:");
        let width = stats
            .by_category
            .iter()
            .map(|c| c.category.len())
            .max()
            .unwrap_or(0);
        for counts in &stats.by_category {
            let _ = writeln!(
                out,
                "  {:<width$}  {:>8} total  {:>8} with text  {:>8} with metadata",
                counts.category,
                counts.total,
                counts.with_text,
                counts.with_metadata,
                width = width
            );
        }
        let _ = writeln!(out);
    }

    if !stats.recent_runs.is_empty() {
        let _ = writeln!(out, "Recent Runs:");
        for run in &stats.recent_runs {
            let _ = writeln!(
                out,
                "  #{} {} since {} [{}]: {} discovered, {} stored, {} skipped, {} failed",
                run.id,
                run.category,
                run.since,
                run.status.to_db_string(),
                run.discovered,
                run.stored,
                run.skipped,
                run.failed
            );
        }
    }

    out
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &DatabaseStatistics) {
    print!("{}", format_statistics(stats));
}
