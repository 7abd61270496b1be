//! Storage module for persisting crawl state
//!
//! This module handles all persistence for the crawler, including:
//! - The frontier of crawl records, deduplicated by key
//! - Per-cycle fetch and parse segments and their merge into the frontier
//! - Cycle tracking for progress reporting and resumption
//!
//! Two backends implement [`CrawlStore`]: [`SqliteStore`] for durable crawls
//! and [`MemoryStore`] for short-lived or test crawls.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CrawlStore, StorageError, StorageResult, StoredDatum};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Store shared between the controller, feeder, workers and filters
pub type SharedStore = Arc<Mutex<dyn CrawlStore>>;

/// Wraps a store for sharing across tasks
pub fn share<S: CrawlStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Locks a shared store for one discrete operation
///
/// Callers must drop the guard before awaiting.
pub fn lock_store(store: &SharedStore) -> StorageResult<MutexGuard<'_, dyn CrawlStore + 'static>> {
    store.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Opens or creates a SQLite-backed store
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Counters produced by a segment merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Fetch segment records written over the frontier
    pub updated: usize,
    /// Parse segment records added as new frontier entries
    pub discovered: usize,
}

/// Final counters of one fetch cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounts {
    pub generated: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Represents a fetch cycle
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub id: i64,
    pub depth: u32,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: CycleStatus,
    pub counts: CycleCounts,
}

/// Status of a fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Running,
    Completed,
    /// Ended early because no record was dequeued within the hang timeout
    HangAborted,
    /// Ended early because a stop was requested
    Interrupted,
    Failed,
}

impl CycleStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::HangAborted => "hang_aborted",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "hang_aborted" => Some(Self::HangAborted),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
