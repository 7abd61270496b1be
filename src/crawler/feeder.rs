//! Background task that keeps the fetch queue topped up

use crate::crawler::generator::Generator;
use crate::crawler::queue::FetchQueue;
use crate::state::{AtomicFeederState, FeederState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Feeds records from a [`Generator`] into a [`FetchQueue`]
///
/// The feeder never pushes more than `target_depth - queue.len()` records per
/// round, so the queue stays within its target depth as long as the feeder is
/// the only producer.
pub struct QueueFeeder {
    state: Arc<AtomicFeederState>,
    stop_flag: Arc<AtomicBool>,
    fed: Arc<AtomicU64>,
    handle: Option<JoinHandle<Box<dyn Generator>>>,
    generator: Option<Box<dyn Generator>>,
}

impl QueueFeeder {
    /// Spawns the feeder task
    ///
    /// # Arguments
    ///
    /// * `generator` - Source of records for this cycle
    /// * `queue` - Queue to fill
    /// * `target_depth` - Depth the feeder tops the queue up to
    /// * `poll_interval` - Sleep when the queue is already at its target depth
    pub fn start(
        generator: Box<dyn Generator>,
        queue: Arc<FetchQueue>,
        target_depth: usize,
        poll_interval: Duration,
    ) -> Self {
        let state = Arc::new(AtomicFeederState::new(FeederState::Running));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let fed = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(feed(
            generator,
            queue,
            target_depth.max(1),
            poll_interval,
            Arc::clone(&state),
            Arc::clone(&stop_flag),
            Arc::clone(&fed),
        ));

        Self {
            state,
            stop_flag,
            fed,
            handle: Some(handle),
            generator: None,
        }
    }

    pub fn state(&self) -> FeederState {
        self.state.load()
    }

    /// Shared view of the feeder state for workers
    pub fn state_handle(&self) -> Arc<AtomicFeederState> {
        Arc::clone(&self.state)
    }

    /// Number of records pushed onto the queue so far
    pub fn fed(&self) -> u64 {
        self.fed.load(Ordering::SeqCst)
    }

    /// Stops the feeder and waits until its task has exited
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(generator) => self.generator = Some(generator),
                Err(e) => tracing::error!("Queue feeder task ended abnormally: {}", e),
            }
        }

        self.state.finish(FeederState::Stopped);
    }

    /// Takes back the generator after [`QueueFeeder::stop`]
    pub fn take_generator(&mut self) -> Option<Box<dyn Generator>> {
        self.generator.take()
    }
}

async fn feed(
    mut generator: Box<dyn Generator>,
    queue: Arc<FetchQueue>,
    target_depth: usize,
    poll_interval: Duration,
    state: Arc<AtomicFeederState>,
    stop_flag: Arc<AtomicBool>,
    fed: Arc<AtomicU64>,
) -> Box<dyn Generator> {
    'feeding: while !stop_flag.load(Ordering::SeqCst) {
        let slack = target_depth.saturating_sub(queue.len());
        if slack == 0 {
            tokio::time::sleep(poll_interval).await;
            continue;
        }

        for _ in 0..slack {
            if stop_flag.load(Ordering::SeqCst) {
                break 'feeding;
            }
            match generator.next() {
                Ok(Some(datum)) => {
                    queue.push(datum);
                    fed.fetch_add(1, Ordering::SeqCst);
                }
                Ok(None) => {
                    tracing::debug!("Generator exhausted after {} record(s)", fed.load(Ordering::SeqCst));
                    state.finish(FeederState::Exhausted);
                    break 'feeding;
                }
                Err(e) => {
                    tracing::error!("Generator failed, no more records this cycle: {}", e);
                    state.finish(FeederState::Failed);
                    break 'feeding;
                }
            }
        }

        tokio::task::yield_now().await;
    }

    state.finish(FeederState::Stopped);
    generator
}
