//! Storage traits and error types
//!
//! This module defines the trait interface for crawl state stores and
//! associated error types.

use crate::model::CrawlDatum;
use crate::state::CrawlStatus;
use crate::storage::{CycleCounts, CycleRecord, CycleStatus, MergeStats};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Cycle not found: {0}")]
    CycleNotFound(i64),

    #[error("Segment writer is not open")]
    SegmentWriterClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A crawl record together with its store-assigned cursor position
#[derive(Debug, Clone)]
pub struct StoredDatum {
    /// Monotonic id used as the generator cursor
    pub id: i64,
    pub datum: CrawlDatum,
}

/// Trait for crawl state store implementations
///
/// The store is the source of truth across cycles. During a cycle workers only
/// append to the fetch and parse segments; [`CrawlStore::merge`] folds both
/// segments into the frontier between cycles. Records are deduplicated by
/// [`CrawlDatum::key`].
pub trait CrawlStore: Send {
    // ===== Frontier =====

    /// Writes a batch of records straight into the frontier
    ///
    /// # Arguments
    ///
    /// * `datums` - Records to inject
    /// * `force` - Overwrite records whose key already exists
    ///
    /// # Returns
    ///
    /// The number of records inserted or overwritten
    fn inject(&mut self, datums: &[CrawlDatum], force: bool) -> StorageResult<usize>;

    /// Gets a record by key
    fn get(&self, key: &str) -> StorageResult<Option<CrawlDatum>>;

    /// Checks whether a key is known to the frontier
    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Reads pending records (unexecuted or failed) positioned after `after_id`
    ///
    /// Results are ordered by id so that repeated calls with the last seen id
    /// walk the frontier exactly once.
    fn scan_pending(&self, after_id: i64, limit: usize) -> StorageResult<Vec<StoredDatum>>;

    /// Lists records, optionally restricted to one status
    fn list(&self, status: Option<CrawlStatus>) -> StorageResult<Vec<CrawlDatum>>;

    /// Removes every record, segment and cycle
    fn clear(&mut self) -> StorageResult<()>;

    // ===== Segments =====

    /// Opens the segment writer for a new cycle
    fn init_segment_writer(&mut self) -> StorageResult<()>;

    /// Records the outcome of one fetch attempt
    ///
    /// A later write for the same key replaces the earlier one.
    fn write_fetch_segment(&mut self, datum: &CrawlDatum) -> StorageResult<()>;

    /// Records newly discovered candidates
    ///
    /// Within one segment the first write for a key wins.
    fn write_parse_segment(&mut self, datums: &[CrawlDatum]) -> StorageResult<()>;

    /// Closes the segment writer; writes after this fail
    fn close_segment_writer(&mut self) -> StorageResult<()>;

    /// Folds both segments into the frontier and empties them
    ///
    /// Fetch segment records overwrite the frontier record with the same key.
    /// Parse segment records are inserted only when their key is absent.
    fn merge(&mut self) -> StorageResult<MergeStats>;

    // ===== Cycles =====

    /// Records the start of a fetch cycle
    fn create_cycle(&mut self, depth: u32, config_hash: &str) -> StorageResult<i64>;

    /// Marks a cycle as finished with its final counters
    fn finish_cycle(
        &mut self,
        cycle_id: i64,
        status: CycleStatus,
        counts: &CycleCounts,
    ) -> StorageResult<()>;

    /// Gets the most recent cycle
    fn get_latest_cycle(&self) -> StorageResult<Option<CycleRecord>>;

    // ===== Statistics =====

    /// Counts records by status
    fn count_by_status(&self, status: CrawlStatus) -> StorageResult<u64>;

    /// Gets total record count
    fn count_total(&self) -> StorageResult<u64>;

    /// Gets total cycle count
    fn count_cycles(&self) -> StorageResult<u64>;
}
