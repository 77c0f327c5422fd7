//! Storage traits and error types
//!
//! This module defines the trait interface for the resumption store and
//! associated error types.

use crate::model::{CandidateRecord, Stamp};
use crate::source::PageDescriptor;
use crate::state::PageState;
use crate::storage::{DescriptorRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Descriptor not found: {0}")]
    DescriptorNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for resumption store implementations
///
/// Only the coordinator task writes to the store.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Descriptor Management =====

    /// Records a newly enqueued descriptor in the `Pending` state
    ///
    /// Returns false if the descriptor key was already recorded.
    fn enqueue_descriptor(&mut self, descriptor: &PageDescriptor, run_id: i64)
        -> StorageResult<bool>;

    /// Gets a descriptor by key
    fn get_descriptor(&self, key: &str) -> StorageResult<Option<DescriptorRecord>>;

    /// Updates the state and attempt count of a descriptor
    fn update_descriptor_state(
        &mut self,
        key: &str,
        state: PageState,
        attempts: u32,
    ) -> StorageResult<()>;

    /// Marks a descriptor as permanently failed
    fn fail_descriptor(
        &mut self,
        key: &str,
        attempts: u32,
        status_code: Option<u16>,
        error_message: &str,
    ) -> StorageResult<()>;

    /// Completes a descriptor in one transaction
    ///
    /// Writes the page's candidate records to the journal, marks it `Done`
    /// with its fetch stamp, and records every discovered descriptor not
    /// already known.
    fn complete_descriptor(
        &mut self,
        key: &str,
        attempts: u32,
        stamp: Stamp,
        records: &[CandidateRecord],
        discovered: &[PageDescriptor],
        run_id: i64,
    ) -> StorageResult<()>;

    /// Loads every descriptor in enqueue order
    fn load_descriptors(&self) -> StorageResult<Vec<DescriptorRecord>>;

    /// Loads descriptors in a given state
    fn get_descriptors_by_state(&self, state: PageState) -> StorageResult<Vec<DescriptorRecord>>;

    /// Counts descriptors in a given state
    fn count_by_state(&self, state: PageState) -> StorageResult<u64>;

    // ===== Candidate Journal =====

    /// Loads the whole candidate journal in stamp order
    fn load_journal(&self) -> StorageResult<Vec<CandidateRecord>>;

    /// Counts journaled candidate records
    fn count_candidates(&self) -> StorageResult<u64>;

    /// Highest stamp handed out so far (zero if none)
    fn max_stamp(&self) -> StorageResult<Stamp>;

    // ===== Housekeeping =====

    /// Forgets all descriptors and journal entries, keeping run history
    fn clear(&mut self) -> StorageResult<()>;
}
