//! Storage module for the resumption cursor
//!
//! This module persists everything needed to resume a halted run:
//! - Run records and their status
//! - Every enqueued page descriptor with its state and attempt count
//! - The candidate journal of completed pages

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::model::Stamp;
use crate::source::PageDescriptor;
use crate::state::PageState;

/// A page descriptor as persisted in the database
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorRecord {
    pub descriptor: PageDescriptor,
    pub state: PageState,
    pub attempts: u32,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub fetch_stamp: Option<Stamp>,
    pub discovered_run: i64,
}

/// One run of the pipeline, possibly spanning several resumed sessions
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a harvest run
///
/// Anything but `Completed` leaves the run open for resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
