//! In-memory storage implementation
//!
//! Mirrors the SQLite store's semantics without durability. Useful for
//! single-run crawls and tests.

use crate::model::CrawlDatum;
use crate::state::CrawlStatus;
use crate::storage::traits::{CrawlStore, StorageError, StorageResult, StoredDatum};
use crate::storage::{CycleCounts, CycleRecord, CycleStatus, MergeStats};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<i64, CrawlDatum>,
    index: HashMap<String, i64>,
    next_id: i64,
    fetch_segment: HashMap<String, CrawlDatum>,
    parse_segment: Vec<CrawlDatum>,
    parse_keys: HashSet<String>,
    segment_open: bool,
    cycles: Vec<CycleRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_new(&mut self, datum: CrawlDatum) {
        self.next_id += 1;
        self.index.insert(datum.key().to_string(), self.next_id);
        self.records.insert(self.next_id, datum);
    }

    /// Inserts or overwrites in place, keeping the existing cursor position
    fn upsert(&mut self, datum: CrawlDatum) {
        match self.index.get(datum.key()).copied() {
            Some(id) => {
                self.records.insert(id, datum);
            }
            None => self.insert_new(datum),
        }
    }

    fn ensure_segment_open(&self) -> StorageResult<()> {
        if self.segment_open {
            Ok(())
        } else {
            Err(StorageError::SegmentWriterClosed)
        }
    }
}

impl CrawlStore for MemoryStore {
    fn inject(&mut self, datums: &[CrawlDatum], force: bool) -> StorageResult<usize> {
        let mut written = 0;
        for datum in datums {
            let exists = self.index.contains_key(datum.key());
            if exists && !force {
                continue;
            }
            self.upsert(datum.clone());
            written += 1;
        }
        Ok(written)
    }

    fn get(&self, key: &str) -> StorageResult<Option<CrawlDatum>> {
        Ok(self
            .index
            .get(key)
            .and_then(|id| self.records.get(id))
            .cloned())
    }

    fn scan_pending(&self, after_id: i64, limit: usize) -> StorageResult<Vec<StoredDatum>> {
        Ok(self
            .records
            .range(after_id.saturating_add(1)..)
            .filter(|(_, datum)| datum.status().is_pending())
            .take(limit)
            .map(|(id, datum)| StoredDatum {
                id: *id,
                datum: datum.clone(),
            })
            .collect())
    }

    fn list(&self, status: Option<CrawlStatus>) -> StorageResult<Vec<CrawlDatum>> {
        Ok(self
            .records
            .values()
            .filter(|datum| status.map_or(true, |s| datum.status() == s))
            .cloned()
            .collect())
    }

    fn clear(&mut self) -> StorageResult<()> {
        *self = Self::default();
        Ok(())
    }

    fn init_segment_writer(&mut self) -> StorageResult<()> {
        self.segment_open = true;
        Ok(())
    }

    fn write_fetch_segment(&mut self, datum: &CrawlDatum) -> StorageResult<()> {
        self.ensure_segment_open()?;
        self.fetch_segment
            .insert(datum.key().to_string(), datum.clone());
        Ok(())
    }

    fn write_parse_segment(&mut self, datums: &[CrawlDatum]) -> StorageResult<()> {
        self.ensure_segment_open()?;
        for datum in datums {
            if self.parse_keys.insert(datum.key().to_string()) {
                self.parse_segment.push(datum.clone());
            }
        }
        Ok(())
    }

    fn close_segment_writer(&mut self) -> StorageResult<()> {
        self.segment_open = false;
        Ok(())
    }

    fn merge(&mut self) -> StorageResult<MergeStats> {
        let mut stats = MergeStats::default();

        for (_, datum) in std::mem::take(&mut self.fetch_segment) {
            self.upsert(datum);
            stats.updated += 1;
        }

        self.parse_keys.clear();
        for datum in std::mem::take(&mut self.parse_segment) {
            if !self.index.contains_key(datum.key()) {
                self.insert_new(datum);
                stats.discovered += 1;
            }
        }

        Ok(stats)
    }

    fn create_cycle(&mut self, depth: u32, config_hash: &str) -> StorageResult<i64> {
        let id = self.cycles.len() as i64 + 1;
        self.cycles.push(CycleRecord {
            id,
            depth,
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            config_hash: config_hash.to_string(),
            status: CycleStatus::Running,
            counts: CycleCounts::default(),
        });
        Ok(id)
    }

    fn finish_cycle(
        &mut self,
        cycle_id: i64,
        status: CycleStatus,
        counts: &CycleCounts,
    ) -> StorageResult<()> {
        let cycle = self
            .cycles
            .iter_mut()
            .find(|c| c.id == cycle_id)
            .ok_or(StorageError::CycleNotFound(cycle_id))?;
        cycle.status = status;
        cycle.counts = *counts;
        cycle.finished_at = Some(Utc::now().to_rfc3339());
        Ok(())
    }

    fn get_latest_cycle(&self) -> StorageResult<Option<CycleRecord>> {
        Ok(self.cycles.last().cloned())
    }

    fn count_by_status(&self, status: CrawlStatus) -> StorageResult<u64> {
        Ok(self
            .records
            .values()
            .filter(|datum| datum.status() == status)
            .count() as u64)
    }

    fn count_total(&self) -> StorageResult<u64> {
        Ok(self.records.len() as u64)
    }

    fn count_cycles(&self) -> StorageResult<u64> {
        Ok(self.cycles.len() as u64)
    }
}
