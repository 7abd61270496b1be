//! Generators produce the pending records of one fetch cycle
//!
//! A generator walks the store with a cursor, yielding each eligible record at
//! most once per cycle. Admission is controlled by [`GeneratorFilter`]s and by
//! the size caps in [`GeneratorOptions`].

use crate::model::CrawlDatum;
use crate::state::CrawlStatus;
use crate::storage::{lock_store, SharedStore, StorageResult, StoredDatum};
use crate::url::RegexRule;
use std::collections::VecDeque;
use std::sync::Arc;

/// Source of pending records for one fetch cycle
pub trait Generator: Send {
    /// Returns the next admitted record, or `None` once exhausted
    fn next(&mut self) -> StorageResult<Option<CrawlDatum>>;

    /// Number of records produced so far in this cycle
    fn total_generated(&self) -> u64;

    /// Releases the store cursor; later calls to `next` return `None`
    fn close(&mut self);
}

/// Admission predicate applied to every candidate record
pub trait GeneratorFilter: Send + Sync {
    fn filter(&self, datum: &CrawlDatum) -> bool;
}

impl<F> GeneratorFilter for F
where
    F: Fn(&CrawlDatum) -> bool + Send + Sync,
{
    fn filter(&self, datum: &CrawlDatum) -> bool {
        self(datum)
    }
}

/// Drops records that already succeeded
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusGeneratorFilter;

impl GeneratorFilter for StatusGeneratorFilter {
    fn filter(&self, datum: &CrawlDatum) -> bool {
        datum.status() != CrawlStatus::Success
    }
}

/// Admits records whose URL satisfies a regex rule
#[derive(Debug, Clone)]
pub struct UrlRuleGeneratorFilter {
    rule: RegexRule,
}

impl UrlRuleGeneratorFilter {
    pub fn new(rule: RegexRule) -> Self {
        Self { rule }
    }
}

impl GeneratorFilter for UrlRuleGeneratorFilter {
    fn filter(&self, datum: &CrawlDatum) -> bool {
        self.rule.satisfy(datum.url())
    }
}

/// Size caps for a generator
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Stop after this many records; `None` is unlimited
    pub top_n: Option<u64>,
    /// Skip records attempted more than this many times; `None` is unlimited
    pub max_execute_count: Option<u32>,
    /// Records read from the store per cursor step
    pub batch_size: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            top_n: None,
            max_execute_count: None,
            batch_size: 256,
        }
    }
}

/// Generator reading pending records from a [`SharedStore`]
pub struct StoreGenerator {
    store: SharedStore,
    options: GeneratorOptions,
    filters: Vec<Arc<dyn GeneratorFilter>>,
    cursor: i64,
    buffer: VecDeque<StoredDatum>,
    store_exhausted: bool,
    closed: bool,
    total: u64,
}

impl StoreGenerator {
    /// Opens a generator and reads its first batch
    ///
    /// # Returns
    ///
    /// * `Ok(StoreGenerator)` - Cursor positioned at the start of the frontier
    /// * `Err(StorageError)` - The store could not be read
    pub fn open(
        store: SharedStore,
        options: GeneratorOptions,
        filters: Vec<Arc<dyn GeneratorFilter>>,
    ) -> StorageResult<Self> {
        let mut generator = Self {
            store,
            options,
            filters,
            cursor: 0,
            buffer: VecDeque::new(),
            store_exhausted: false,
            closed: false,
            total: 0,
        };
        generator.fill_buffer()?;
        Ok(generator)
    }

    fn fill_buffer(&mut self) -> StorageResult<()> {
        let batch_size = self.options.batch_size.max(1);
        let batch = {
            let store = lock_store(&self.store)?;
            store.scan_pending(self.cursor, batch_size)?
        };
        if batch.len() < batch_size {
            self.store_exhausted = true;
        }
        if let Some(last) = batch.last() {
            self.cursor = last.id;
        }
        self.buffer.extend(batch);
        Ok(())
    }

    fn admits(&self, datum: &CrawlDatum) -> bool {
        if !datum.status().is_pending() {
            return false;
        }
        if let Some(max) = self.options.max_execute_count {
            if datum.execute_count() > max {
                return false;
            }
        }
        self.filters.iter().all(|f| f.filter(datum))
    }

    fn top_n_reached(&self) -> bool {
        matches!(self.options.top_n, Some(n) if self.total >= n)
    }
}

impl Generator for StoreGenerator {
    fn next(&mut self) -> StorageResult<Option<CrawlDatum>> {
        loop {
            if self.closed || self.top_n_reached() {
                return Ok(None);
            }

            let stored = match self.buffer.pop_front() {
                Some(stored) => stored,
                None if self.store_exhausted => return Ok(None),
                None => {
                    self.fill_buffer()?;
                    continue;
                }
            };

            if self.admits(&stored.datum) {
                self.total += 1;
                return Ok(Some(stored.datum));
            }
        }
    }

    fn total_generated(&self) -> u64 {
        self.total
    }

    fn close(&mut self) {
        self.closed = true;
        self.buffer.clear();
    }
}

/// Creates the generator for each fetch cycle
pub trait GeneratorFactory: Send + Sync {
    fn create(&self, store: &SharedStore) -> StorageResult<Box<dyn Generator>>;
}

/// Factory producing [`StoreGenerator`]s
#[derive(Clone, Default)]
pub struct StoreGeneratorFactory {
    options: GeneratorOptions,
    filters: Vec<Arc<dyn GeneratorFilter>>,
}

impl StoreGeneratorFactory {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            filters: vec![Arc::new(StatusGeneratorFilter)],
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn GeneratorFilter>) -> Self {
        self.filters.push(filter);
        self
    }
}

impl GeneratorFactory for StoreGeneratorFactory {
    fn create(&self, store: &SharedStore) -> StorageResult<Box<dyn Generator>> {
        let generator =
            StoreGenerator::open(Arc::clone(store), self.options.clone(), self.filters.clone())?;
        Ok(Box::new(generator))
    }
}
