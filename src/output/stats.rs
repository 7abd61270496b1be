//! Statistics generation from the crawl store
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::CrawlStatus;
use crate::storage::{CrawlStore, CycleRecord, StorageResult};
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of records in the frontier
    pub total_records: u64,

    /// Count of records by status
    pub records_by_status: HashMap<CrawlStatus, u64>,

    /// Number of fetch cycles recorded
    pub total_cycles: u64,

    /// The most recent cycle, if any
    pub latest_cycle: Option<CycleRecord>,
}

impl CrawlStatistics {
    pub fn count(&self, status: CrawlStatus) -> u64 {
        self.records_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The store to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(store: &dyn CrawlStore) -> StorageResult<CrawlStatistics> {
    let total_records = store.count_total()?;

    let mut records_by_status = HashMap::new();
    for status in CrawlStatus::all_statuses() {
        let count = store.count_by_status(status)?;
        if count > 0 {
            records_by_status.insert(status, count);
        }
    }

    Ok(CrawlStatistics {
        total_records,
        records_by_status,
        total_cycles: store.count_cycles()?,
        latest_cycle: store.get_latest_cycle()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!("  Fetch cycles: {}", stats.total_cycles);
    println!();

    println!("Records by Status:");
    let mut status_counts: Vec<_> = stats.records_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in status_counts {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if let Some(cycle) = &stats.latest_cycle {
        println!("Latest Cycle:");
        println!("  Depth: {}", cycle.depth);
        println!("  Status: {}", cycle.status.to_db_string());
        println!("  Started: {}", cycle.started_at);
        if let Some(finished) = &cycle.finished_at {
            println!("  Finished: {}", finished);
        }
        println!(
            "  Generated: {}, succeeded: {}, failed: {}",
            cycle.counts.generated, cycle.counts.succeeded, cycle.counts.failed
        );
        println!();
    }

    let succeeded = stats.count(CrawlStatus::Success);
    let attempted = succeeded + stats.count(CrawlStatus::Failed);
    let success_rate = if attempted > 0 {
        (succeeded as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} attempted records)",
        success_rate, succeeded, attempted
    );
}
