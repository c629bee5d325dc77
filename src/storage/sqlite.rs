//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `RecordStore`
//! and `VocabularyStore` traits.

use crate::model::{
    Authority, Decision, DecisionFields, DecisionKind, NewAuthority, ProcedureKind, SubjectArea,
    SENTINEL_ABBREVIATION,
};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageError, StorageResult, VocabularyStore};
use crate::storage::{CategoryCounts, FailureRecord, RunRecord, RunStatus, UpsertOutcome};
use crate::{CrawlError, FailureKind};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::path::Path;

const AUTHORITY_COLUMNS: &str =
    "id, name, category, identifier, abbreviation, begin_date, end_date";

const RUN_COLUMNS: &str = "id, started_at, finished_at, category, since, config_hash, status,
     discovered, stored, skipped, failed, authority_fallbacks";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CrawlError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database, used by tests and dry runs
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_subject_areas(&self, decision_id: i64) -> StorageResult<Vec<SubjectArea>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.name, s.identifier FROM subject_areas s
             JOIN decision_subject_areas l ON l.subject_area_id = s.id
             WHERE l.decision_id = ?1 ORDER BY s.identifier",
        )?;

        let areas = stmt
            .query_map(params![decision_id], |row| {
                Ok(SubjectArea {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    identifier: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(areas)
    }

    fn load_procedure_kinds(&self, decision_id: i64) -> StorageResult<Vec<ProcedureKind>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.name, p.identifier FROM procedure_kinds p
             JOIN decision_procedure_kinds l ON l.procedure_kind_id = p.id
             WHERE l.decision_id = ?1 ORDER BY p.identifier",
        )?;

        let kinds = stmt
            .query_map(params![decision_id], |row| {
                Ok(ProcedureKind {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    identifier: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(kinds)
    }

    fn query_authorities(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> StorageResult<Vec<Authority>> {
        let sql = format!(
            "SELECT {} FROM authorities {} ORDER BY name",
            AUTHORITY_COLUMNS, filter
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let authorities = stmt
            .query_map(params, row_to_authority)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(authorities)
    }
}

fn row_to_authority(row: &Row<'_>) -> rusqlite::Result<Authority> {
    Ok(Authority {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        identifier: row.get(3)?,
        abbreviation: row.get(4)?,
        begin_date: row.get(5)?,
        end_date: row.get(6)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        category: row.get(3)?,
        since: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(RunStatus::Failed),
        discovered: row.get::<_, i64>(7)? as u64,
        stored: row.get::<_, i64>(8)? as u64,
        skipped: row.get::<_, i64>(9)? as u64,
        failed: row.get::<_, i64>(10)? as u64,
        authority_fallbacks: row.get::<_, i64>(11)? as u64,
    })
}

impl RecordStore for SqliteStorage {
    // ===== Decisions =====

    fn exists(&self, ecli: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM decisions WHERE ecli = ?1",
                params![ecli],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn upsert_decision(
        &mut self,
        fields: &DecisionFields,
        authority: &Authority,
        subject_areas: &[SubjectArea],
        procedure_kinds: &[ProcedureKind],
    ) -> StorageResult<UpsertOutcome> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM decisions WHERE ecli = ?1",
                params![fields.ecli],
                |row| row.get(0),
            )
            .optional()?;

        let decision_id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE decisions SET case_number = ?1, decision_date = ?2,
                     publication_date = ?3, raw_document = ?4, summary = ?5, body = ?6,
                     kind = ?7, authority_id = ?8, updated_at = ?9
                     WHERE id = ?10",
                    params![
                        fields.case_number,
                        fields.decision_date,
                        fields.publication_date,
                        fields.raw_document,
                        fields.summary,
                        fields.body,
                        fields.kind.to_db_string(),
                        authority.id,
                        now,
                        id
                    ],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO decisions (ecli, case_number, decision_date, publication_date,
                     raw_document, summary, body, kind, authority_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                    params![
                        fields.ecli,
                        fields.case_number,
                        fields.decision_date,
                        fields.publication_date,
                        fields.raw_document,
                        fields.summary,
                        fields.body,
                        fields.kind.to_db_string(),
                        authority.id,
                        now
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        // Links are only ever added
        for area in subject_areas {
            tx.execute(
                "INSERT OR IGNORE INTO decision_subject_areas (decision_id, subject_area_id)
                 VALUES (?1, ?2)",
                params![decision_id, area.id],
            )?;
        }
        for kind in procedure_kinds {
            tx.execute(
                "INSERT OR IGNORE INTO decision_procedure_kinds (decision_id, procedure_kind_id)
                 VALUES (?1, ?2)",
                params![decision_id, kind.id],
            )?;
        }

        tx.commit()?;

        let decision = self
            .get_decision(&fields.ecli)?
            .ok_or_else(|| StorageError::DecisionNotFound(fields.ecli.clone()))?;

        Ok(UpsertOutcome {
            decision,
            created: existing.is_none(),
        })
    }

    fn get_decision(&self, ecli: &str) -> StorageResult<Option<Decision>> {
        let row = self
            .conn
            .query_row(
                "SELECT d.id, d.ecli, d.case_number, d.decision_date, d.publication_date,
                 d.raw_document, d.summary, d.body, d.kind, d.metadata, d.created_at, d.updated_at,
                 a.id, a.name, a.category, a.identifier, a.abbreviation, a.begin_date, a.end_date
                 FROM decisions d JOIN authorities a ON a.id = d.authority_id
                 WHERE d.ecli = ?1",
                params![ecli],
                |row| {
                    let authority = Authority {
                        id: row.get(12)?,
                        name: row.get(13)?,
                        category: row.get(14)?,
                        identifier: row.get(15)?,
                        abbreviation: row.get(16)?,
                        begin_date: row.get(17)?,
                        end_date: row.get(18)?,
                    };
                    let kind: String = row.get(8)?;
                    let metadata: String = row.get(9)?;
                    Ok((
                        Decision {
                            id: row.get(0)?,
                            ecli: row.get(1)?,
                            case_number: row.get(2)?,
                            decision_date: row.get(3)?,
                            publication_date: row.get(4)?,
                            raw_document: row.get(5)?,
                            summary: row.get(6)?,
                            body: row.get(7)?,
                            kind: DecisionKind::from_db_string(&kind).unwrap_or_default(),
                            metadata: Map::new(),
                            authority,
                            subject_areas: Vec::new(),
                            procedure_kinds: Vec::new(),
                            created_at: row.get(10)?,
                            updated_at: row.get(11)?,
                        },
                        metadata,
                    ))
                },
            )
            .optional()?;

        let Some((mut decision, metadata)) = row else {
            return Ok(None);
        };

        decision.metadata = serde_json::from_str(&metadata)?;
        decision.subject_areas = self.load_subject_areas(decision.id)?;
        decision.procedure_kinds = self.load_procedure_kinds(decision.id)?;

        Ok(Some(decision))
    }

    fn set_metadata(&mut self, ecli: &str, job_id: &str, value: Value) -> StorageResult<()> {
        let current: String = self
            .conn
            .query_row(
                "SELECT metadata FROM decisions WHERE ecli = ?1",
                params![ecli],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::DecisionNotFound(ecli.to_string()))?;

        let mut metadata: Map<String, Value> = serde_json::from_str(&current)?;
        metadata.insert(job_id.to_string(), value);

        self.conn.execute(
            "UPDATE decisions SET metadata = ?1 WHERE ecli = ?2",
            params![serde_json::to_string(&metadata)?, ecli],
        )?;
        Ok(())
    }

    // ===== Run Management =====

    fn create_run(
        &mut self,
        category: &str,
        since: NaiveDate,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_runs (started_at, category, since, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                now,
                category,
                since,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM crawl_runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], row_to_run)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM crawl_runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params![limit as i64], row_to_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn record_failure(
        &mut self,
        run_id: i64,
        ecli: &str,
        kind: FailureKind,
        message: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_failures (run_id, ecli, kind, message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, ecli, kind.to_db_string(), message, now],
        )?;
        Ok(())
    }

    fn get_failures(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, ecli, kind, message, recorded_at FROM crawl_failures
             WHERE run_id = ?1 ORDER BY id",
        )?;

        let failures = stmt
            .query_map(params![run_id], |row| {
                Ok(FailureRecord {
                    run_id: row.get(0)?,
                    ecli: row.get(1)?,
                    kind: FailureKind::from_db_string(&row.get::<_, String>(2)?)
                        .unwrap_or(FailureKind::Other),
                    message: row.get(3)?,
                    recorded_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(failures)
    }

    fn finish_run(&mut self, run: &RunRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_runs SET finished_at = ?1, status = ?2, discovered = ?3, stored = ?4,
             skipped = ?5, failed = ?6, authority_fallbacks = ?7 WHERE id = ?8",
            params![
                now,
                run.status.to_db_string(),
                run.discovered as i64,
                run.stored as i64,
                run.skipped as i64,
                run.failed as i64,
                run.authority_fallbacks as i64,
                run.id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run.id));
        }
        Ok(())
    }

    // ===== Statistics =====

    fn count_decisions(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_decisions_by_category(&self) -> StorageResult<Vec<CategoryCounts>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.category, COUNT(*),
                    SUM(CASE WHEN d.body != '' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN d.metadata != '{}' THEN 1 ELSE 0 END)
             FROM decisions d JOIN authorities a ON a.id = d.authority_id
             GROUP BY a.category
             ORDER BY a.category",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok(CategoryCounts {
                    category: row.get(0)?,
                    total: row.get::<_, i64>(1)? as u64,
                    with_text: row.get::<_, i64>(2)? as u64,
                    with_metadata: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}

impl VocabularyStore for SqliteStorage {
    fn find_authority_by_name(&self, name: &str) -> StorageResult<Option<Authority>> {
        let sql = format!("SELECT {} FROM authorities WHERE name = ?1", AUTHORITY_COLUMNS);
        let authority = self
            .conn
            .query_row(&sql, params![name], row_to_authority)
            .optional()?;
        Ok(authority)
    }

    fn sentinel_authority(&self) -> StorageResult<Authority> {
        let sql = format!(
            "SELECT {} FROM authorities WHERE abbreviation = ?1 ORDER BY id LIMIT 1",
            AUTHORITY_COLUMNS
        );
        self.conn
            .query_row(&sql, params![SENTINEL_ABBREVIATION], row_to_authority)
            .optional()?
            .ok_or(StorageError::SentinelMissing)
    }

    fn authorities_by_category(&self, category: &str) -> StorageResult<Vec<Authority>> {
        self.query_authorities(
            "WHERE category = ?1 AND abbreviation != ?2",
            params![category, SENTINEL_ABBREVIATION],
        )
    }

    fn categories(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT category FROM authorities WHERE abbreviation != ?1 ORDER BY category",
        )?;
        let categories = stmt
            .query_map(params![SENTINEL_ABBREVIATION], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn all_authorities(&self) -> StorageResult<Vec<Authority>> {
        self.query_authorities("", [])
    }

    fn all_subject_areas(&self) -> StorageResult<Vec<SubjectArea>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, identifier FROM subject_areas ORDER BY identifier")?;
        let areas = stmt
            .query_map([], |row| {
                Ok(SubjectArea {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    identifier: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(areas)
    }

    fn all_procedure_kinds(&self) -> StorageResult<Vec<ProcedureKind>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, identifier FROM procedure_kinds ORDER BY identifier")?;
        let kinds = stmt
            .query_map([], |row| {
                Ok(ProcedureKind {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    identifier: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(kinds)
    }

    fn upsert_authority(&mut self, authority: &NewAuthority) -> StorageResult<Authority> {
        self.conn.execute(
            "INSERT INTO authorities (name, category, identifier, abbreviation, begin_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                category = excluded.category,
                identifier = excluded.identifier,
                abbreviation = excluded.abbreviation,
                begin_date = excluded.begin_date,
                end_date = excluded.end_date",
            params![
                authority.name,
                authority.category,
                authority.identifier,
                authority.abbreviation,
                authority.begin_date,
                authority.end_date
            ],
        )?;

        self.find_authority_by_name(&authority.name)?
            .ok_or_else(|| StorageError::Database(format!("authority {} vanished", authority.name)))
    }

    fn upsert_subject_area(&mut self, name: &str, identifier: &str) -> StorageResult<SubjectArea> {
        self.conn.execute(
            "INSERT INTO subject_areas (name, identifier) VALUES (?1, ?2)
             ON CONFLICT(identifier) DO UPDATE SET name = excluded.name",
            params![name, identifier],
        )?;

        let area = self.conn.query_row(
            "SELECT id, name, identifier FROM subject_areas WHERE identifier = ?1",
            params![identifier],
            |row| {
                Ok(SubjectArea {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    identifier: row.get(2)?,
                })
            },
        )?;
        Ok(area)
    }

    fn upsert_procedure_kind(
        &mut self,
        name: &str,
        identifier: &str,
    ) -> StorageResult<ProcedureKind> {
        self.conn.execute(
            "INSERT INTO procedure_kinds (name, identifier) VALUES (?1, ?2)
             ON CONFLICT(identifier) DO UPDATE SET name = excluded.name",
            params![name, identifier],
        )?;

        let kind = self.conn.query_row(
            "SELECT id, name, identifier FROM procedure_kinds WHERE identifier = ?1",
            params![identifier],
            |row| {
                Ok(ProcedureKind {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    identifier: row.get(2)?,
                })
            },
        )?;
        Ok(kind)
    }
}
