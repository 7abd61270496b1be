//! Crawler coordinator - main crawl orchestration logic
//!
//! This module runs a crawl as a sequence of fetch cycles:
//! - Clearing or resuming the store
//! - Injecting seeds and forced seeds
//! - Running one scheduler cycle per depth level
//! - Recording every cycle with its outcome and counters

use crate::crawler::executor::Executor;
use crate::crawler::filter::NextFilter;
use crate::crawler::generator::{GeneratorFactory, GeneratorOptions, StoreGeneratorFactory};
use crate::crawler::scheduler::{CycleSummary, Scheduler, SchedulerOptions, StopHandle};
use crate::model::{CrawlDatum, CrawlDatums};
use crate::storage::{lock_store, CycleCounts, CycleStatus, SharedStore};
use crate::{ConfigError, Result};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a whole crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// One entry per cycle that ran, in order
    pub cycles: Vec<CycleSummary>,
}

impl CrawlReport {
    pub fn total_generated(&self) -> u64 {
        self.cycles.iter().map(|c| c.generated).sum()
    }

    pub fn total_succeeded(&self) -> u64 {
        self.cycles.iter().map(|c| c.succeeded).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.cycles.iter().map(|c| c.failed).sum()
    }

    pub fn elapsed(&self) -> Duration {
        self.cycles.iter().map(|c| c.elapsed).sum()
    }

    /// Whether the crawl ended because a stop was requested
    pub fn interrupted(&self) -> bool {
        self.cycles.last().map(|c| c.interrupted).unwrap_or(false)
    }
}

/// Main crawler coordinator structure
pub struct Crawler {
    store: SharedStore,
    executor: Option<Arc<dyn Executor>>,
    next_filter: Option<Arc<dyn NextFilter>>,
    generator_factory: Option<Arc<dyn GeneratorFactory>>,
    generator_options: GeneratorOptions,
    options: SchedulerOptions,
    seeds: CrawlDatums,
    forced_seeds: CrawlDatums,
    resumable: bool,
    config_hash: String,
    stop: StopHandle,
}

impl Crawler {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            executor: None,
            next_filter: None,
            generator_factory: None,
            generator_options: GeneratorOptions::default(),
            options: SchedulerOptions::default(),
            seeds: CrawlDatums::new(),
            forced_seeds: CrawlDatums::new(),
            resumable: false,
            config_hash: String::new(),
            stop: StopHandle::new(),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_next_filter(mut self, filter: Arc<dyn NextFilter>) -> Self {
        self.next_filter = Some(filter);
        self
    }

    /// Replaces the default [`StoreGeneratorFactory`]
    pub fn with_generator_factory(mut self, factory: Arc<dyn GeneratorFactory>) -> Self {
        self.generator_factory = Some(factory);
        self
    }

    /// Caps used by the default generator factory
    pub fn with_generator_options(mut self, options: GeneratorOptions) -> Self {
        self.generator_options = options;
        self
    }

    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Keeps the store from earlier runs instead of clearing it
    pub fn resumable(mut self, resumable: bool) -> Self {
        self.resumable = resumable;
        self
    }

    /// Hash recorded with every cycle
    pub fn config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Adds a seed injected only when its key is unknown
    pub fn add_seed(&mut self, datum: CrawlDatum) -> &mut Self {
        self.seeds.add(datum);
        self
    }

    /// Adds a seed injected over any existing record with the same key
    pub fn add_forced_seed(&mut self, datum: CrawlDatum) -> &mut Self {
        self.forced_seeds.add(datum);
        self
    }

    pub fn seeds(&self) -> &CrawlDatums {
        &self.seeds
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn has_seeds(&self) -> bool {
        !self.seeds.is_empty() || !self.forced_seeds.is_empty()
    }

    /// Runs up to `depth` fetch cycles
    ///
    /// The loop ends early when a cycle generates nothing or a stop was
    /// requested. A cycle that hits the hang timeout does not end the crawl.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Summaries of the cycles that ran
    /// * `Err(CrawlError)` - Missing executor, storage failure, or a cycle
    ///   that could not be opened
    pub async fn start(&self, depth: u32) -> Result<CrawlReport> {
        let executor = self
            .executor
            .clone()
            .ok_or(ConfigError::MissingExecutor)?;

        let mut report = CrawlReport::default();

        // A stopped crawler leaves the store untouched until its handle is reset
        if self.stop.is_stopped() {
            tracing::info!("Stop requested, not starting the crawl");
            return Ok(report);
        }

        {
            let mut store = lock_store(&self.store)?;
            if !self.resumable {
                tracing::info!("Starting a fresh crawl, clearing the store");
                store.clear()?;
            }

            if !self.has_seeds() && (!self.resumable || store.count_total()? == 0) {
                tracing::error!("No seeds to crawl from, add at least one seed");
                return Ok(report);
            }

            if !self.seeds.is_empty() {
                let injected = store.inject(self.seeds.as_slice(), false)?;
                tracing::info!("Injected {} of {} seed(s)", injected, self.seeds.len());
            }
            if !self.forced_seeds.is_empty() {
                let injected = store.inject(self.forced_seeds.as_slice(), true)?;
                tracing::info!("Injected {} forced seed(s)", injected);
            }
        }

        let factory = self.generator_factory.clone().unwrap_or_else(|| {
            Arc::new(StoreGeneratorFactory::new(self.generator_options.clone()))
        });
        let mut scheduler = Scheduler::new(Arc::clone(&self.store))
            .with_executor(executor)
            .with_generator_factory(factory)
            .with_options(self.options.clone())
            .with_stop_handle(self.stop.clone());
        if let Some(filter) = &self.next_filter {
            scheduler = scheduler.with_next_filter(Arc::clone(filter));
        }

        for level in 1..=depth {
            if self.stop.is_stopped() {
                tracing::info!("Stop requested, not starting depth {}", level);
                break;
            }

            tracing::info!("Starting depth {}", level);
            let cycle_id = lock_store(&self.store)?.create_cycle(level, &self.config_hash)?;

            let summary = match scheduler.run_cycle().await {
                Ok(summary) => summary,
                Err(e) => {
                    self.record_cycle(cycle_id, CycleStatus::Failed, &CycleCounts::default());
                    return Err(e);
                }
            };
            self.record_cycle(cycle_id, summary.status(), &summary.counts());

            tracing::info!(
                "Depth {} finished: {} url(s) generated in {:.1}s",
                level,
                summary.generated,
                summary.elapsed.as_secs_f64()
            );

            let generated = summary.generated;
            let interrupted = summary.interrupted;
            report.cycles.push(summary);

            if generated == 0 {
                tracing::info!("Nothing left to fetch, stopping after depth {}", level);
                break;
            }
            if interrupted {
                break;
            }
        }

        Ok(report)
    }

    fn record_cycle(&self, cycle_id: i64, status: CycleStatus, counts: &CycleCounts) {
        let finished = lock_store(&self.store)
            .and_then(|mut store| store.finish_cycle(cycle_id, status, counts));
        if let Err(e) = finished {
            tracing::error!("Failed to record cycle {}: {}", cycle_id, e);
        }
    }
}
