//! Output module: sinks and run reports
//!
//! This module handles:
//! - Streaming finalized entities into a sink (SQLite or in-memory)
//! - Rendering markdown summaries of a run
//! - Reporting resumption-store statistics

mod markdown;
mod memory;
mod sqlite_output;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use memory::MemorySink;
pub use sqlite_output::{content_hash, SqliteSink};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use traits::{Ack, FailedPage, OutputError, OutputResult, RunSummary, Sink, SinkError};

use crate::model::Entity;

/// Counts from one load into a sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub upserted: u64,
    pub unchanged: u64,
}

/// Streams entities into a sink as one all-or-nothing load
///
/// Entities are expected in natural-key order. On the first error the load
/// is rolled back and the error returned.
///
/// # Arguments
///
/// * `sink` - The destination
/// * `entities` - Finalized entities
///
/// # Returns
///
/// * `Ok(LoadReport)` - Every entity was accepted and the load committed
/// * `Err(SinkError)` - The load was rolled back
pub fn load_into<S: Sink + ?Sized>(sink: &mut S, entities: &[Entity]) -> Result<LoadReport, SinkError> {
    sink.begin()?;

    let mut report = LoadReport::default();
    for entity in entities {
        match sink.upsert(entity) {
            Ok(ack) if ack.changed => report.upserted += 1,
            Ok(_) => report.unchanged += 1,
            Err(e) => {
                tracing::error!("Sink rejected {}: {}", entity.key(), e);
                if let Err(rollback) = sink.rollback() {
                    tracing::error!("Sink rollback failed: {}", rollback);
                }
                return Err(e);
            }
        }
    }

    if let Err(e) = sink.commit() {
        if let Err(rollback) = sink.rollback() {
            tracing::error!("Sink rollback failed: {}", rollback);
        }
        return Err(e);
    }

    tracing::debug!(
        "Loaded {} entities ({} changed)",
        entities.len(),
        report.upserted
    );
    Ok(report)
}
