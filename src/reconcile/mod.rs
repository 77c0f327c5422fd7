//! Entity reconciliation
//!
//! Candidate records from many pages are folded into one entity per natural
//! key. The fold is deterministic for a fixed set of candidates regardless
//! of the order they arrive in, which is what lets concurrent workers finish
//! pages in any order and still produce the same table.

mod field;
mod table;

pub use field::FieldConflict;
pub use table::{merge, EntityTable};

use crate::model::{CandidateRecord, CompanyKey, DiscKey, Entity, EntityKey, Stamp};
use std::fmt;

/// Two pages disagreed about one field of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationWarning {
    pub entity: EntityKey,
    pub field: &'static str,
    pub kept: String,
    pub kept_stamp: Stamp,
    pub rejected: String,
    pub rejected_stamp: Stamp,
    /// Descriptor key of the page whose merge raised the conflict
    pub source: String,
}

impl ReconciliationWarning {
    pub fn is_flight_number(&self) -> bool {
        matches!(self.field, "speed" | "glide" | "turn" | "fade")
    }
}

impl fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conflicting {} for {}: kept '{}' ({}) over '{}' ({})",
            self.field, self.entity, self.kept, self.kept_stamp, self.rejected, self.rejected_stamp
        )
    }
}

/// A disc whose manufacturer never appeared as a company
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub disc: DiscKey,
    pub manufacturer: CompanyKey,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "disc {} references unknown company '{}'",
            self.disc, self.manufacturer
        )
    }
}

/// The table as handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedTable {
    /// Every entity, in natural-key order
    pub entities: Vec<Entity>,
    pub dangling: Vec<DanglingReference>,
}

/// Owns the entity table and the warnings raised while building it
///
/// Only the coordinator task holds a `Reconciler`, so there is exactly one
/// writer of the table.
#[derive(Debug, Default)]
pub struct Reconciler {
    table: EntityTable,
    warnings: Vec<ReconciliationWarning>,
    merged: u64,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one record, keeping any conflict warnings it raised
    pub fn apply(&mut self, record: &CandidateRecord) {
        let warnings = self.table.merge(record);
        self.warnings.extend(warnings);
        self.merged += 1;
    }

    pub fn apply_all<'a>(&mut self, records: impl IntoIterator<Item = &'a CandidateRecord>) {
        for record in records {
            self.apply(record);
        }
    }

    pub fn table(&self) -> &EntityTable {
        &self.table
    }

    pub fn warnings(&self) -> &[ReconciliationWarning] {
        &self.warnings
    }

    /// Number of candidate records merged so far
    pub fn merged(&self) -> u64 {
        self.merged
    }

    pub fn finalize(&self) -> FinalizedTable {
        self.table.finalize()
    }
}
