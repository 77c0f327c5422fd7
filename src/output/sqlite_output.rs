//! SQLite-based entity sink
//!
//! Finalized entities land in one table per entity kind, keyed by natural
//! key. A whole load runs in a single transaction, and a SHA-256 hash of
//! each entity's payload detects upserts that would change nothing.

use crate::model::{Entity, Tenths};
use crate::output::traits::{Ack, Sink, SinkError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;

const SINK_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    company_key TEXT PRIMARY KEY,
    name TEXT,
    location TEXT,
    website TEXT,
    active INTEGER,
    payload TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS discs (
    manufacturer_key TEXT NOT NULL,
    model_key TEXT NOT NULL,
    model TEXT,
    manufacturer TEXT,
    speed REAL,
    glide REAL,
    turn REAL,
    fade REAL,
    payload TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (manufacturer_key, model_key)
);

CREATE TABLE IF NOT EXISTS players (
    pdga_number INTEGER PRIMARY KEY,
    name TEXT,
    rating INTEGER,
    payload TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    event_id INTEGER PRIMARY KEY,
    name TEXT,
    start_date TEXT,
    payload TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Hex-encoded SHA-256 of an entity's payload
pub fn content_hash(entity: &Entity) -> Result<String, SinkError> {
    let payload = serde_json::to_string(&entity.payload())?;
    Ok(hex::encode(Sha256::digest(payload.as_bytes())))
}

/// Sink writing reconciled entities into SQLite tables
pub struct SqliteSink {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteSink {
    /// Opens (or creates) the sink tables in the database at `path`
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(SINK_SCHEMA_SQL)?;
        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    /// Number of rows stored for an entity kind ("company", "disc", ...)
    pub fn count(&self, kind: &str) -> Result<u64, SinkError> {
        let table = table_for(kind)
            .ok_or_else(|| SinkError::Transaction(format!("unknown entity kind '{}'", kind)))?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn stored_hash(&self, entity: &Entity) -> Result<Option<String>, SinkError> {
        let hash = match entity {
            Entity::Company(c) => self
                .conn
                .query_row(
                    "SELECT content_hash FROM companies WHERE company_key = ?1",
                    params![c.key.as_str()],
                    |row| row.get(0),
                )
                .optional()?,
            Entity::Disc(d) => self
                .conn
                .query_row(
                    "SELECT content_hash FROM discs WHERE manufacturer_key = ?1 AND model_key = ?2",
                    params![d.key.manufacturer.as_str(), d.key.model],
                    |row| row.get(0),
                )
                .optional()?,
            Entity::Player(p) => self
                .conn
                .query_row(
                    "SELECT content_hash FROM players WHERE pdga_number = ?1",
                    params![p.key.0],
                    |row| row.get(0),
                )
                .optional()?,
            Entity::Event(e) => self
                .conn
                .query_row(
                    "SELECT content_hash FROM events WHERE event_id = ?1",
                    params![e.key.0],
                    |row| row.get(0),
                )
                .optional()?,
        };
        Ok(hash)
    }

    fn write(&self, entity: &Entity, hash: &str) -> Result<(), SinkError> {
        let payload = serde_json::to_string(&entity.payload())?;
        let now = Utc::now().to_rfc3339();

        match entity {
            Entity::Company(c) => {
                self.conn.execute(
                    "INSERT INTO companies (company_key, name, location, website, active, payload, content_hash, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(company_key) DO UPDATE SET
                         name = excluded.name, location = excluded.location,
                         website = excluded.website, active = excluded.active,
                         payload = excluded.payload, content_hash = excluded.content_hash,
                         updated_at = excluded.updated_at",
                    params![
                        c.key.as_str(),
                        c.name.value(),
                        c.location.value(),
                        c.website.value(),
                        c.active.value(),
                        payload,
                        hash,
                        now
                    ],
                )?;
            }
            Entity::Disc(d) => {
                let flight = |field: Option<&Tenths>| field.map(Tenths::as_f64);
                self.conn.execute(
                    "INSERT INTO discs (manufacturer_key, model_key, model, manufacturer, speed, glide, turn, fade, payload, content_hash, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(manufacturer_key, model_key) DO UPDATE SET
                         model = excluded.model, manufacturer = excluded.manufacturer,
                         speed = excluded.speed, glide = excluded.glide,
                         turn = excluded.turn, fade = excluded.fade,
                         payload = excluded.payload, content_hash = excluded.content_hash,
                         updated_at = excluded.updated_at",
                    params![
                        d.key.manufacturer.as_str(),
                        d.key.model,
                        d.model.value(),
                        d.manufacturer.value(),
                        flight(d.speed.value()),
                        flight(d.glide.value()),
                        flight(d.turn.value()),
                        flight(d.fade.value()),
                        payload,
                        hash,
                        now
                    ],
                )?;
            }
            Entity::Player(p) => {
                self.conn.execute(
                    "INSERT INTO players (pdga_number, name, rating, payload, content_hash, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(pdga_number) DO UPDATE SET
                         name = excluded.name, rating = excluded.rating,
                         payload = excluded.payload, content_hash = excluded.content_hash,
                         updated_at = excluded.updated_at",
                    params![p.key.0, p.name.value(), p.rating.value(), payload, hash, now],
                )?;
            }
            Entity::Event(e) => {
                self.conn.execute(
                    "INSERT INTO events (event_id, name, start_date, payload, content_hash, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(event_id) DO UPDATE SET
                         name = excluded.name, start_date = excluded.start_date,
                         payload = excluded.payload, content_hash = excluded.content_hash,
                         updated_at = excluded.updated_at",
                    params![
                        e.key.0,
                        e.name.value(),
                        e.start_date.value().map(|date| date.to_string()),
                        payload,
                        hash,
                        now
                    ],
                )?;
            }
        }

        Ok(())
    }
}

fn table_for(kind: &str) -> Option<&'static str> {
    match kind {
        "company" => Some("companies"),
        "disc" => Some("discs"),
        "player" => Some("players"),
        "event" => Some("events"),
        _ => None,
    }
}

impl Sink for SqliteSink {
    fn begin(&mut self) -> Result<(), SinkError> {
        if self.in_transaction {
            return Err(SinkError::Transaction("load already in progress".to_string()));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction = true;
        Ok(())
    }

    fn upsert(&mut self, entity: &Entity) -> Result<Ack, SinkError> {
        let hash = content_hash(entity)?;
        let changed = self.stored_hash(entity)?.as_deref() != Some(hash.as_str());

        if changed {
            self.write(entity, &hash)?;
        }

        Ok(Ack {
            key: entity.key(),
            changed,
        })
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        if !self.in_transaction {
            return Err(SinkError::Transaction("no load in progress".to_string()));
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SinkError> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Company, CompanyKey, Disc, DiscKey, Field, Stamp};

    fn company(name: &str, location: Option<&str>) -> Entity {
        let mut company = Company::new(CompanyKey::new(name).unwrap());
        company.name = Field::observed(Some(name.to_string()), Stamp(1));
        company.location = Field::observed(location.map(str::to_string), Stamp(1));
        Entity::Company(company)
    }

    fn destroyer(glide: i32, stamp: u64) -> Entity {
        let key = DiscKey::new(CompanyKey::new("Innova").unwrap(), "Destroyer").unwrap();
        let mut disc = Disc::new(key);
        disc.model = Field::observed(Some("Destroyer".to_string()), Stamp(stamp));
        disc.glide = Field::observed(Some(Tenths(glide)), Stamp(stamp));
        Entity::Disc(disc)
    }

    #[test]
    fn test_upsert_reports_changes() {
        let mut sink = SqliteSink::open_in_memory().unwrap();

        let first = sink.upsert(&company("Innova", None)).unwrap();
        assert!(first.changed);
        assert_eq!(first.key.kind(), "company");

        let again = sink.upsert(&company("Innova", None)).unwrap();
        assert!(!again.changed);

        let updated = sink.upsert(&company("Innova", Some("Rancho Cucamonga, CA"))).unwrap();
        assert!(updated.changed);
        assert_eq!(sink.count("company").unwrap(), 1);
    }

    #[test]
    fn test_hash_ignores_stamps() {
        assert_eq!(
            content_hash(&destroyer(50, 1)).unwrap(),
            content_hash(&destroyer(50, 7)).unwrap()
        );
        assert_ne!(
            content_hash(&destroyer(50, 1)).unwrap(),
            content_hash(&destroyer(55, 1)).unwrap()
        );
    }

    #[test]
    fn test_rollback_discards_load() {
        let mut sink = SqliteSink::open_in_memory().unwrap();

        sink.begin().unwrap();
        sink.upsert(&destroyer(50, 1)).unwrap();
        sink.rollback().unwrap();
        assert_eq!(sink.count("disc").unwrap(), 0);

        sink.begin().unwrap();
        sink.upsert(&destroyer(50, 1)).unwrap();
        sink.commit().unwrap();
        assert_eq!(sink.count("disc").unwrap(), 1);
    }

    #[test]
    fn test_transaction_misuse() {
        let mut sink = SqliteSink::open_in_memory().unwrap();

        assert!(sink.commit().is_err());
        sink.begin().unwrap();
        assert!(sink.begin().is_err());
        assert!(sink.count("tournament").is_err());
    }
}
