//! Sink trait and run summary types
//!
//! This module defines the trait interface for entity sinks and the data
//! structures describing the outcome of a run.

use crate::model::{Entity, EntityKey};
use crate::reconcile::{DanglingReference, ReconciliationWarning};
use crate::source::PageKind;
use crate::storage::RunStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors a sink can raise
///
/// Any sink error is fatal for the run.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to serialize entity: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink rejected {key}: {reason}")]
    Rejected { key: EntityKey, reason: String },

    #[error("Sink transaction error: {0}")]
    Transaction(String),
}

/// Errors that can occur while writing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report output
pub type OutputResult<T> = Result<T, OutputError>;

/// Acknowledgement of one upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub key: EntityKey,

    /// False when identical content was already stored
    pub changed: bool,
}

/// Destination for finalized entities
///
/// Upserts are idempotent by natural key. The coordinator calls `begin`
/// once, `upsert` for every entity in natural-key order, then `commit`; on
/// any error it calls `rollback` instead.
pub trait Sink {
    fn begin(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn upsert(&mut self, entity: &Entity) -> Result<Ack, SinkError>;

    fn commit(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A descriptor that failed permanently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPage {
    pub key: String,
    pub kind: PageKind,
    pub attempts: u32,
    pub status: Option<u16>,
    pub reason: String,
}

/// Outcome of one session of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    // Run metadata
    pub run_id: i64,
    pub status: RunStatus,
    pub config_hash: String,
    pub started_at: String,
    pub elapsed: Duration,
    pub resumed: bool,

    // Pages
    /// Pages whose body was downloaded in this session
    pub pages_fetched: u64,
    /// HTTP attempts made in this session, retries included
    pub fetch_attempts: u64,
    pub pages_done: u64,
    pub pages_pending: u64,
    pub failed: Vec<FailedPage>,

    // Data quality
    pub conflicts: Vec<ReconciliationWarning>,
    pub dangling: Vec<DanglingReference>,

    // Entities
    pub companies: usize,
    pub discs: usize,
    pub players: usize,
    pub events: usize,
    pub upserted: u64,
    pub unchanged: u64,
}

impl RunSummary {
    pub fn entity_count(&self) -> usize {
        self.companies + self.discs + self.players + self.events
    }

    /// Conflicts on speed, glide, turn or fade
    pub fn flight_number_conflicts(&self) -> usize {
        self.conflicts
            .iter()
            .filter(|warning| warning.is_flight_number())
            .count()
    }

    /// Writes the headline numbers to the log
    pub fn log(&self) {
        tracing::info!(
            "Run {} {}: {} pages fetched, {} done, {} failed, {} pending",
            self.run_id,
            self.status.to_db_string(),
            self.pages_fetched,
            self.pages_done,
            self.failed.len(),
            self.pages_pending
        );
        tracing::info!(
            "Entities: {} companies, {} discs, {} players, {} events ({} upserted, {} unchanged)",
            self.companies,
            self.discs,
            self.players,
            self.events,
            self.upserted,
            self.unchanged
        );
        if !self.conflicts.is_empty() || !self.dangling.is_empty() {
            tracing::info!(
                "Data quality: {} conflicts ({} on flight numbers), {} dangling references",
                self.conflicts.len(),
                self.flight_number_conflicts(),
                self.dangling.len()
            );
        }
        for page in &self.failed {
            tracing::info!("Failed page {}: {}", page.key, page.reason);
        }
    }
}
