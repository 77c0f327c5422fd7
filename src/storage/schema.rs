//! Database schema definitions for the resumption store

/// SQL schema for the resumption store
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Every page descriptor enqueued in the current run, with its state
CREATE TABLE IF NOT EXISTS descriptors (
    key TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    cursor TEXT NOT NULL,
    page INTEGER NOT NULL,
    state TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    status_code INTEGER,
    error_message TEXT,
    fetch_stamp INTEGER,
    discovered_run INTEGER NOT NULL REFERENCES runs(id),
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_descriptors_state ON descriptors(state);

-- Candidate journal: what each completed page contributed
CREATE TABLE IF NOT EXISTS candidates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    descriptor_key TEXT NOT NULL REFERENCES descriptors(key),
    stamp INTEGER NOT NULL,
    ordinal INTEGER NOT NULL,
    payload TEXT NOT NULL,
    UNIQUE(descriptor_key, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_candidates_stamp ON candidates(stamp);
"#;

/// Initializes the database schema
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
    Ok(())
}
