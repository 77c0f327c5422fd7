//! Statistics from the resumption store
//!
//! Backs the `--stats` flag: shows how far the current run has progressed
//! without starting any fetches.

use crate::source::PageKind;
use crate::state::PageState;
use crate::storage::{RunRecord, Storage};
use crate::HarvestError;
use std::collections::BTreeMap;

/// Progress of the run recorded in the store
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Total number of descriptors ever enqueued in the current run
    pub total_descriptors: u64,

    /// Count of descriptors by state
    pub descriptors_by_state: BTreeMap<&'static str, u64>,

    /// Count of descriptors by page kind
    pub descriptors_by_kind: BTreeMap<&'static str, u64>,

    /// Journaled candidate records
    pub candidates: u64,

    /// Failed descriptors with their error message
    pub failures: Vec<(String, String)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let descriptors = storage.load_descriptors()?;

    let mut descriptors_by_state = BTreeMap::new();
    for state in PageState::all_states() {
        let count = storage.count_by_state(state)?;
        if count > 0 {
            descriptors_by_state.insert(state.to_db_string(), count);
        }
    }

    let mut descriptors_by_kind = BTreeMap::new();
    for kind in PageKind::all_kinds() {
        let count = descriptors
            .iter()
            .filter(|record| record.descriptor.kind == kind)
            .count() as u64;
        if count > 0 {
            descriptors_by_kind.insert(kind.to_db_string(), count);
        }
    }

    let failures = descriptors
        .iter()
        .filter(|record| record.state == PageState::Failed)
        .map(|record| {
            (
                record.descriptor.key(),
                record.error_message.clone().unwrap_or_default(),
            )
        })
        .collect();

    Ok(HarvestStatistics {
        latest_run: storage.get_latest_run()?,
        total_descriptors: descriptors.len() as u64,
        descriptors_by_state,
        descriptors_by_kind,
        candidates: storage.count_candidates()?,
        failures,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    match &stats.latest_run {
        Some(run) => {
            println!("Latest run: #{} ({})", run.id, run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded yet"),
    }
    println!();

    println!("Descriptors: {}", stats.total_descriptors);
    println!("Candidate records: {}", stats.candidates);
    println!();

    println!("By State:");
    for (state, count) in &stats.descriptors_by_state {
        println!("  {}: {} ({:.1}%)", state, count, percentage(*count, stats.total_descriptors));
    }
    println!();

    println!("By Kind:");
    for (kind, count) in &stats.descriptors_by_kind {
        println!("  {}: {}", kind, count);
    }
    println!();

    if !stats.failures.is_empty() {
        println!("Failures ({}):", stats.failures.len());
        for (key, message) in &stats.failures {
            println!("  - {}: {}", key, message);
        }
        println!();
    }

    let done = stats.descriptors_by_state.get("done").copied().unwrap_or(0);
    println!(
        "Progress: {:.1}% ({} / {} descriptors done)",
        percentage(done, stats.total_descriptors),
        done,
        stats.total_descriptors
    );
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PageDescriptor;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash").unwrap();

        let listing = PageDescriptor::index(PageKind::CompanyIndex, 0);
        let detail = PageDescriptor::detail(PageKind::DiscDetail, "ghost");
        storage.enqueue_descriptor(&listing, run_id).unwrap();
        storage.enqueue_descriptor(&detail, run_id).unwrap();
        storage
            .fail_descriptor(&detail.key(), 1, Some(404), "HTTP 404")
            .unwrap();

        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.latest_run.unwrap().id, run_id);
        assert_eq!(stats.total_descriptors, 2);
        assert_eq!(stats.descriptors_by_state.get("pending"), Some(&1));
        assert_eq!(stats.descriptors_by_state.get("failed"), Some(&1));
        assert_eq!(stats.descriptors_by_kind.get("disc_detail"), Some(&1));
        assert_eq!(stats.candidates, 0);
        assert_eq!(
            stats.failures,
            vec![("disc_detail/ghost".to_string(), "HTTP 404".to_string())]
        );
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }
}
