//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the decision database.

use crate::model::{SENTINEL_ABBREVIATION, SENTINEL_AUTHORITY_NAME};
use rusqlite::params;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Controlled vocabularies, seeded by external import jobs
CREATE TABLE IF NOT EXISTS authorities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL,
    identifier TEXT NOT NULL,
    abbreviation TEXT NOT NULL,
    begin_date TEXT NOT NULL,
    end_date TEXT
);

CREATE INDEX IF NOT EXISTS idx_authorities_category ON authorities(category);

CREATE TABLE IF NOT EXISTS subject_areas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    identifier TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS procedure_kinds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    identifier TEXT NOT NULL UNIQUE
);

-- Decisions, keyed by ECLI
CREATE TABLE IF NOT EXISTS decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ecli TEXT NOT NULL UNIQUE,
    case_number TEXT NOT NULL DEFAULT '',
    decision_date TEXT NOT NULL DEFAULT '1000-01-01',
    publication_date TEXT NOT NULL DEFAULT '1000-01-01',
    raw_document TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    kind TEXT NOT NULL DEFAULT 'Uitspraak',
    metadata TEXT NOT NULL DEFAULT '{}',
    authority_id INTEGER NOT NULL REFERENCES authorities(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_decisions_authority_published
    ON decisions(authority_id, publication_date);
CREATE INDEX IF NOT EXISTS idx_decisions_authority_decided
    ON decisions(authority_id, decision_date);

-- Append-only vocabulary links
CREATE TABLE IF NOT EXISTS decision_subject_areas (
    decision_id INTEGER NOT NULL REFERENCES decisions(id) ON DELETE CASCADE,
    subject_area_id INTEGER NOT NULL REFERENCES subject_areas(id),
    PRIMARY KEY (decision_id, subject_area_id)
);

CREATE TABLE IF NOT EXISTS decision_procedure_kinds (
    decision_id INTEGER NOT NULL REFERENCES decisions(id) ON DELETE CASCADE,
    procedure_kind_id INTEGER NOT NULL REFERENCES procedure_kinds(id),
    PRIMARY KEY (decision_id, procedure_kind_id)
);

-- Track crawl runs
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    category TEXT NOT NULL,
    since TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    discovered INTEGER NOT NULL DEFAULT 0,
    stored INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    authority_fallbacks INTEGER NOT NULL DEFAULT 0
);

-- Per-item failures of a run
CREATE TABLE IF NOT EXISTS crawl_failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES crawl_runs(id),
    ecli TEXT NOT NULL,
    kind TEXT NOT NULL,
    message TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_failures_run ON crawl_failures(run_id);
"#;

/// Initializes the database schema and the placeholder authority
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO authorities (name, category, identifier, abbreviation, begin_date)
         VALUES (?1, 'Onbekend', 'urn:rechtspraak:onbekende-instantie', ?2, '1000-01-01')",
        params![SENTINEL_AUTHORITY_NAME, SENTINEL_ABBREVIATION],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());

        // The placeholder authority is seeded exactly once
        let sentinels: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM authorities WHERE abbreviation = ?1",
                params![SENTINEL_ABBREVIATION],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(sentinels, 1);
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "authorities",
            "subject_areas",
            "procedure_kinds",
            "decisions",
            "decision_subject_areas",
            "decision_procedure_kinds",
            "crawl_runs",
            "crawl_failures",
        ];

        for table in tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
