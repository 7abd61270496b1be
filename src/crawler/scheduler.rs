//! Scheduler controller driving one fetch cycle
//!
//! This module handles:
//! - Opening a cycle: segment merge, segment writer, generator, feeder
//! - A pool of long-lived worker tasks pulling from the fetch queue
//! - Periodic monitoring with hang detection
//! - Bounded draining and forced termination of stuck workers
//! - Closing a cycle: feeder shutdown, segment merge, summary

use crate::crawler::executor::Executor;
use crate::crawler::feeder::QueueFeeder;
use crate::crawler::filter::NextFilter;
use crate::crawler::generator::{GeneratorFactory, GeneratorOptions, StoreGeneratorFactory};
use crate::crawler::queue::FetchQueue;
use crate::model::{CrawlDatum, CrawlDatums};
use crate::state::{
    AtomicFeederState, AtomicSchedulerState, CrawlStatus, FeederState, SchedulerState,
};
use crate::storage::{lock_store, CycleCounts, CycleStatus, SharedStore};
use crate::{ConfigError, CrawlError, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Queue depth below which the queue is dumped once the feeder is done
const DUMP_QUEUE_BELOW: usize = 5;

/// Runtime knobs of the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Number of worker tasks
    pub threads: usize,
    /// Depth the feeder keeps the fetch queue at
    pub queue_depth: usize,
    /// Abort the cycle when nothing was dequeued for this long
    pub hang_timeout: Duration,
    /// How long draining waits for busy workers before aborting them
    pub drain_timeout: Duration,
    /// Pause after each record, per worker
    pub execute_interval: Duration,
    pub monitor_interval: Duration,
    pub spin_wait: Duration,
    pub feeder_poll: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            threads: 50,
            queue_depth: 1000,
            hang_timeout: Duration::from_secs(120),
            drain_timeout: Duration::from_secs(120),
            execute_interval: Duration::ZERO,
            monitor_interval: Duration::from_millis(1000),
            spin_wait: Duration::from_millis(500),
            feeder_poll: Duration::from_millis(1000),
        }
    }
}

/// Cooperative stop request shared between the controller and its callers
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop; calling it again has no further effect
    pub fn stop(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::info!("Stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears an earlier stop request so the owner can run again
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Outcome of one fetch cycle
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    /// Records produced by the generator
    pub generated: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// The cycle ended because no record was dequeued within the hang timeout
    pub hung_abort: bool,
    /// The cycle ended because a stop was requested
    pub interrupted: bool,
    /// The generator failed, so some pending records were never handed out
    pub truncated: bool,
    /// Workers aborted after the drain timeout
    pub workers_killed: usize,
    /// New records added to the frontier by the closing merge
    pub discovered: usize,
    pub elapsed: Duration,
}

impl CycleSummary {
    pub fn status(&self) -> CycleStatus {
        if self.interrupted {
            CycleStatus::Interrupted
        } else if self.hung_abort {
            CycleStatus::HangAborted
        } else if self.truncated {
            CycleStatus::Failed
        } else {
            CycleStatus::Completed
        }
    }

    pub fn counts(&self) -> CycleCounts {
        CycleCounts {
            generated: self.generated,
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnding {
    Completed,
    HangAborted,
    Interrupted,
}

/// Counters shared by the workers and the monitor
#[derive(Debug, Default)]
struct CycleCounters {
    active: AtomicUsize,
    started: AtomicUsize,
    spin_waiting: AtomicUsize,
    succeeded: AtomicU64,
    failed: AtomicU64,
    last_dequeue_ms: AtomicU64,
}

/// Decrements `active` when a worker exits, including by abort
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct WorkerContext {
    store: SharedStore,
    executor: Arc<dyn Executor>,
    next_filter: Option<Arc<dyn NextFilter>>,
    queue: Arc<FetchQueue>,
    feeder_state: Arc<AtomicFeederState>,
    running: AtomicBool,
    counters: CycleCounters,
    origin: Instant,
    spin_wait: Duration,
    execute_interval: Duration,
}

impl WorkerContext {
    fn millis_since_origin(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn mark_dequeue(&self) {
        self.counters
            .last_dequeue_ms
            .store(self.millis_since_origin(), Ordering::SeqCst);
    }

    fn since_last_dequeue(&self) -> Duration {
        let last = self.counters.last_dequeue_ms.load(Ordering::SeqCst);
        Duration::from_millis(self.millis_since_origin().saturating_sub(last))
    }
}

/// Drives fetch cycles against a shared store
pub struct Scheduler {
    store: SharedStore,
    executor: Option<Arc<dyn Executor>>,
    next_filter: Option<Arc<dyn NextFilter>>,
    generator_factory: Arc<dyn GeneratorFactory>,
    options: SchedulerOptions,
    state: Arc<AtomicSchedulerState>,
    stop: StopHandle,
    queue: Arc<FetchQueue>,
}

impl Scheduler {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            executor: None,
            next_filter: None,
            generator_factory: Arc::new(StoreGeneratorFactory::new(GeneratorOptions::default())),
            options: SchedulerOptions::default(),
            state: Arc::new(AtomicSchedulerState::new(SchedulerState::Idle)),
            stop: StopHandle::new(),
            queue: Arc::new(FetchQueue::new()),
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

    pub fn with_generator_factory(mut self, factory: Arc<dyn GeneratorFactory>) -> Self {
        self.generator_factory = factory;
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

    pub fn state(&self) -> SchedulerState {
        self.state.load()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn queue(&self) -> &FetchQueue {
        &self.queue
    }

    /// Runs one generate → fetch → merge cycle
    ///
    /// # Returns
    ///
    /// * `Ok(CycleSummary)` - The cycle ran, possibly ending early
    /// * `Err(CrawlError)` - No executor was configured, or the cycle could
    ///   not be opened
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let executor = self
            .executor
            .clone()
            .ok_or(CrawlError::Config(ConfigError::MissingExecutor))?;

        if !self.state.transition(SchedulerState::Idle, SchedulerState::Running)
            && !self.state.transition(SchedulerState::Stopped, SchedulerState::Running)
        {
            return Err(CrawlError::CycleAborted(format!(
                "scheduler is already {}",
                self.state.load()
            )));
        }

        let result = self.run_cycle_inner(executor).await;
        self.state.store(SchedulerState::Stopped);
        result
    }

    async fn run_cycle_inner(&self, executor: Arc<dyn Executor>) -> Result<CycleSummary> {
        let started_at = Instant::now();
        let threads = self.options.threads.max(1);

        {
            let mut store = lock_store(&self.store)?;
            let merged = store.merge()?;
            if merged.updated > 0 || merged.discovered > 0 {
                tracing::info!(
                    "Recovered pending segments: {} updated, {} discovered",
                    merged.updated,
                    merged.discovered
                );
            }
            store.init_segment_writer()?;
        }
        if let Some(filter) = &self.next_filter {
            filter.reset();
        }

        let generator = match self.generator_factory.create(&self.store) {
            Ok(generator) => generator,
            Err(e) => {
                if let Err(close_err) = lock_store(&self.store).and_then(|mut s| s.close_segment_writer()) {
                    tracing::error!("Failed to close segment writer: {}", close_err);
                }
                return Err(CrawlError::CycleAborted(format!(
                    "failed to create generator: {}",
                    e
                )));
            }
        };

        let mut feeder = QueueFeeder::start(
            generator,
            Arc::clone(&self.queue),
            self.options.queue_depth,
            self.options.feeder_poll,
        );

        // The hang clock starts once records can flow
        let ctx = Arc::new(WorkerContext {
            store: Arc::clone(&self.store),
            executor,
            next_filter: self.next_filter.clone(),
            queue: Arc::clone(&self.queue),
            feeder_state: feeder.state_handle(),
            running: AtomicBool::new(true),
            counters: CycleCounters::default(),
            origin: Instant::now(),
            spin_wait: self.options.spin_wait,
            execute_interval: self.options.execute_interval,
        });

        tracing::info!("Starting fetch cycle with {} worker(s)", threads);
        let handles: Vec<JoinHandle<()>> = (0..threads)
            .map(|id| tokio::spawn(run_worker(Arc::clone(&ctx), id)))
            .collect();

        let ending = self.monitor(&ctx, threads).await;

        self.state.store(SchedulerState::Draining);
        ctx.running.store(false, Ordering::SeqCst);
        let workers_killed = self.drain(&ctx, handles).await;

        let truncated = feeder.state() == FeederState::Failed;
        feeder.stop().await;
        let dropped = self.queue.clear();
        if dropped > 0 {
            tracing::debug!("Discarded {} queued record(s)", dropped);
        }
        let generated = match feeder.take_generator() {
            Some(mut generator) => {
                generator.close();
                generator.total_generated()
            }
            None => feeder.fed(),
        };

        let discovered = {
            let closed = lock_store(&self.store).and_then(|mut store| {
                store.close_segment_writer()?;
                store.merge()
            });
            match closed {
                Ok(stats) => stats.discovered,
                Err(e) => {
                    tracing::error!("Failed to merge segments: {}", e);
                    0
                }
            }
        };

        let summary = CycleSummary {
            generated,
            succeeded: ctx.counters.succeeded.load(Ordering::SeqCst),
            failed: ctx.counters.failed.load(Ordering::SeqCst),
            hung_abort: ending == CycleEnding::HangAborted,
            interrupted: ending == CycleEnding::Interrupted,
            truncated,
            workers_killed,
            discovered,
            elapsed: started_at.elapsed(),
        };

        tracing::info!(
            "Fetch cycle finished in {:.1}s: {} generated, {} succeeded, {} failed, {} discovered",
            summary.elapsed.as_secs_f64(),
            summary.generated,
            summary.succeeded,
            summary.failed,
            summary.discovered
        );
        if truncated {
            tracing::warn!("Generator failed during the cycle; remaining records stay pending");
        }

        Ok(summary)
    }

    async fn monitor(&self, ctx: &WorkerContext, threads: usize) -> CycleEnding {
        loop {
            tokio::time::sleep(self.options.monitor_interval).await;

            let active = ctx.counters.active.load(Ordering::SeqCst);
            let started = ctx.counters.started.load(Ordering::SeqCst);
            let queued = self.queue.len();
            tracing::info!(
                "-active workers={}, spin waiting={}, fetch queue={}",
                active,
                ctx.counters.spin_waiting.load(Ordering::SeqCst),
                queued
            );

            if !ctx.feeder_state.load().is_alive() && queued < DUMP_QUEUE_BELOW && active > 0 {
                self.queue.dump();
            }

            if self.stop.is_stopped() {
                return CycleEnding::Interrupted;
            }

            if started == threads && active == 0 {
                return CycleEnding::Completed;
            }

            let idle = ctx.since_last_dequeue();
            if idle > self.options.hang_timeout {
                tracing::warn!(
                    "No record dequeued for {:.1}s, aborting the cycle",
                    idle.as_secs_f64()
                );
                return CycleEnding::HangAborted;
            }
        }
    }

    /// Waits for workers to finish, aborting any still busy past the drain timeout
    async fn drain(&self, ctx: &WorkerContext, handles: Vec<JoinHandle<()>>) -> usize {
        let deadline = Instant::now() + self.options.drain_timeout;
        let poll = self.options.monitor_interval.min(Duration::from_millis(100));

        while ctx.counters.active.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            tokio::time::sleep(poll).await;
        }

        let mut killed = 0;
        for (id, handle) in handles.iter().enumerate() {
            if !handle.is_finished() {
                tracing::warn!(
                    "Worker {} still busy after {:.1}s drain timeout, aborting it; its in-flight request is abandoned",
                    id,
                    self.options.drain_timeout.as_secs_f64()
                );
                handle.abort();
                killed += 1;
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!("Worker task ended abnormally: {}", e);
                }
            }
        }

        killed
    }
}

async fn run_worker(ctx: Arc<WorkerContext>, id: usize) {
    ctx.counters.active.fetch_add(1, Ordering::SeqCst);
    ctx.counters.started.fetch_add(1, Ordering::SeqCst);
    let _active = ActiveGuard(&ctx.counters.active);

    while ctx.running.load(Ordering::SeqCst) {
        let Some(datum) = ctx.queue.pop() else {
            if ctx.feeder_state.load().is_alive() || !ctx.queue.is_empty() {
                ctx.counters.spin_waiting.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(ctx.spin_wait).await;
                ctx.counters.spin_waiting.fetch_sub(1, Ordering::SeqCst);
                continue;
            }
            break;
        };

        ctx.mark_dequeue();
        process(&ctx, datum).await;

        if !ctx.execute_interval.is_zero() {
            tokio::time::sleep(ctx.execute_interval).await;
        }
    }

    tracing::debug!("Worker {} exiting", id);
}

async fn process(ctx: &WorkerContext, datum: CrawlDatum) {
    let (mut datum, next, success) = execute_isolated(ctx, datum).await;

    let next: CrawlDatums = match &ctx.next_filter {
        Some(filter) => next
            .into_iter()
            .filter_map(|candidate| filter.filter(candidate, &datum))
            .collect(),
        None => next,
    };

    if success {
        datum.set_status(CrawlStatus::Success);
        ctx.counters.succeeded.fetch_add(1, Ordering::SeqCst);
    } else {
        datum.set_status(CrawlStatus::Failed);
        ctx.counters.failed.fetch_add(1, Ordering::SeqCst);
    }
    datum.incr_execute_count(1);
    datum.set_execute_time(Some(Utc::now()));

    let persisted = lock_store(&ctx.store).and_then(|mut store| {
        store.write_fetch_segment(&datum)?;
        if !next.is_empty() {
            store.write_parse_segment(next.as_slice())?;
        }
        Ok(())
    });
    if let Err(e) = persisted {
        tracing::error!("Failed to persist {}: {}", datum.brief_info(), e);
    }
}

/// Runs the executor in its own task so a panic only fails this record
async fn execute_isolated(ctx: &WorkerContext, datum: CrawlDatum) -> (CrawlDatum, CrawlDatums, bool) {
    let fallback = datum.clone();
    let executor = Arc::clone(&ctx.executor);

    let task = tokio::spawn(async move {
        let mut datum = datum;
        let mut next = CrawlDatums::new();
        let result = executor.execute(&mut datum, &mut next).await;
        (datum, next, result)
    });

    match task.await {
        Ok((datum, next, Ok(()))) => {
            tracing::info!("Fetched {}", datum.brief_info());
            (datum, next, true)
        }
        Ok((datum, _, Err(e))) => {
            tracing::warn!("Failed {}: {:#}", datum.brief_info(), e);
            (datum, CrawlDatums::new(), false)
        }
        Err(e) => {
            tracing::error!("Executor crashed on {}: {}", fallback.brief_info(), e);
            (fallback, CrawlDatums::new(), false)
        }
    }
}
