//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{Candidate, CandidateRecord, Stamp};
use crate::source::{PageDescriptor, PageKind};
use crate::state::PageState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{DescriptorRecord, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const DESCRIPTOR_COLUMNS: &str = "key, kind, cursor, page, state, attempts, status_code,
     error_message, fetch_stamp, discovered_run";

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
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // The sink writes to the same file through its own connection
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Raw descriptor row, converted outside the rusqlite row closure
struct DescriptorRow {
    key: String,
    kind: String,
    cursor: String,
    page: u32,
    state: String,
    attempts: u32,
    status_code: Option<u16>,
    error_message: Option<String>,
    fetch_stamp: Option<i64>,
    discovered_run: i64,
}

impl DescriptorRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            kind: row.get(1)?,
            cursor: row.get(2)?,
            page: row.get(3)?,
            state: row.get(4)?,
            attempts: row.get(5)?,
            status_code: row.get(6)?,
            error_message: row.get(7)?,
            fetch_stamp: row.get(8)?,
            discovered_run: row.get(9)?,
        })
    }

    fn into_record(self) -> StorageResult<DescriptorRecord> {
        let kind = PageKind::from_db_string(&self.kind).ok_or_else(|| {
            StorageError::Corrupt(format!("descriptor {} has unknown kind '{}'", self.key, self.kind))
        })?;
        let state = PageState::from_db_string(&self.state).ok_or_else(|| {
            StorageError::Corrupt(format!(
                "descriptor {} has unknown state '{}'",
                self.key, self.state
            ))
        })?;

        Ok(DescriptorRecord {
            descriptor: PageDescriptor {
                kind,
                page: self.page,
                cursor: self.cursor,
            },
            state,
            attempts: self.attempts,
            status_code: self.status_code,
            error_message: self.error_message,
            fetch_stamp: self.fetch_stamp.map(|s| Stamp(s as u64)),
            discovered_run: self.discovered_run,
        })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn insert_pending(
    conn: &Connection,
    descriptor: &PageDescriptor,
    run_id: i64,
    now: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO descriptors (key, kind, cursor, page, state, attempts, discovered_run, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
        params![
            descriptor.key(),
            descriptor.kind.to_db_string(),
            descriptor.cursor,
            descriptor.page,
            PageState::Pending.to_db_string(),
            run_id,
            now
        ],
    )
}

impl SqliteStorage {
    fn query_descriptors(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> StorageResult<Vec<DescriptorRecord>> {
        let sql = format!(
            "SELECT {} FROM descriptors {} ORDER BY rowid",
            DESCRIPTOR_COLUMNS, filter
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, DescriptorRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(DescriptorRow::into_record).collect()
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    // ===== Descriptor Management =====

    fn enqueue_descriptor(
        &mut self,
        descriptor: &PageDescriptor,
        run_id: i64,
    ) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = insert_pending(&self.conn, descriptor, run_id, &now)?;
        Ok(inserted > 0)
    }

    fn get_descriptor(&self, key: &str) -> StorageResult<Option<DescriptorRecord>> {
        let sql = format!("SELECT {} FROM descriptors WHERE key = ?1", DESCRIPTOR_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![key], DescriptorRow::from_row)
            .optional()?;
        row.map(DescriptorRow::into_record).transpose()
    }

    fn update_descriptor_state(
        &mut self,
        key: &str,
        state: PageState,
        attempts: u32,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE descriptors SET state = ?1, attempts = ?2, updated_at = ?3 WHERE key = ?4",
            params![state.to_db_string(), attempts, now, key],
        )?;
        if updated == 0 {
            return Err(StorageError::DescriptorNotFound(key.to_string()));
        }
        Ok(())
    }

    fn fail_descriptor(
        &mut self,
        key: &str,
        attempts: u32,
        status_code: Option<u16>,
        error_message: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE descriptors SET state = ?1, attempts = ?2, status_code = ?3,
             error_message = ?4, updated_at = ?5 WHERE key = ?6",
            params![
                PageState::Failed.to_db_string(),
                attempts,
                status_code,
                error_message,
                now,
                key
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::DescriptorNotFound(key.to_string()));
        }
        Ok(())
    }

    fn complete_descriptor(
        &mut self,
        key: &str,
        attempts: u32,
        stamp: Stamp,
        records: &[CandidateRecord],
        discovered: &[PageDescriptor],
        run_id: i64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE descriptors SET state = ?1, attempts = ?2, fetch_stamp = ?3,
             status_code = NULL, error_message = NULL, updated_at = ?4 WHERE key = ?5",
            params![
                PageState::Done.to_db_string(),
                attempts,
                stamp.0 as i64,
                now,
                key
            ],
        )?;
        if updated == 0 {
            // Dropping the transaction rolls it back
            return Err(StorageError::DescriptorNotFound(key.to_string()));
        }

        tx.execute(
            "DELETE FROM candidates WHERE descriptor_key = ?1",
            params![key],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO candidates (descriptor_key, stamp, ordinal, payload) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (ordinal, record) in records.iter().enumerate() {
                let payload = serde_json::to_string(&record.candidate)?;
                insert.execute(params![key, stamp.0 as i64, ordinal as i64, payload])?;
            }
        }

        for descriptor in discovered {
            insert_pending(&tx, descriptor, run_id, &now)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_descriptors(&self) -> StorageResult<Vec<DescriptorRecord>> {
        self.query_descriptors("", [])
    }

    fn get_descriptors_by_state(&self, state: PageState) -> StorageResult<Vec<DescriptorRecord>> {
        self.query_descriptors("WHERE state = ?1", params![state.to_db_string()])
    }

    fn count_by_state(&self, state: PageState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM descriptors WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Candidate Journal =====

    fn load_journal(&self) -> StorageResult<Vec<CandidateRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT descriptor_key, stamp, payload FROM candidates ORDER BY stamp, descriptor_key, ordinal",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(source, stamp, payload)| {
                let candidate: Candidate = serde_json::from_str(&payload)?;
                Ok(CandidateRecord::new(Stamp(stamp as u64), source, candidate))
            })
            .collect()
    }

    fn count_candidates(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM candidates", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn max_stamp(&self) -> StorageResult<Stamp> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(fetch_stamp) FROM descriptors",
            [],
            |row| row.get(0),
        )?;
        Ok(Stamp(max.unwrap_or(0) as u64))
    }

    // ===== Housekeeping =====

    fn clear(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM candidates", [])?;
        tx.execute("DELETE FROM descriptors", [])?;
        tx.commit()?;
        Ok(())
    }
}
