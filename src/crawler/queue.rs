//! In-memory fetch queue shared by the feeder and the workers

use crate::model::CrawlDatum;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Thread-safe FIFO of records waiting to be fetched
///
/// The queue is soft-bounded: the feeder keeps it at or below its target
/// depth, the queue itself never rejects a push. `pop` never blocks; an empty
/// result means "nothing right now", not "done".
#[derive(Debug, Default)]
pub struct FetchQueue {
    items: Mutex<VecDeque<CrawlDatum>>,
    peak: AtomicUsize,
}

impl FetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<CrawlDatum>> {
        // A poisoned queue still holds consistent data: every operation is a
        // single VecDeque call.
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, datum: CrawlDatum) {
        let mut items = self.items();
        items.push_back(datum);
        self.peak.fetch_max(items.len(), Ordering::SeqCst);
    }

    pub fn pop(&self) -> Option<CrawlDatum> {
        self.items().pop_front()
    }

    /// Current depth; advisory only
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Highest depth observed since creation
    pub fn peak_len(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Removes and returns every queued record
    pub fn drain(&self) -> Vec<CrawlDatum> {
        self.items().drain(..).collect()
    }

    /// Discards every queued record, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut items = self.items();
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Copies the queue contents without removing them
    pub fn snapshot(&self) -> Vec<CrawlDatum> {
        self.items().iter().cloned().collect()
    }

    /// Logs every queued record for diagnostics
    pub fn dump(&self) {
        let snapshot = self.snapshot();
        tracing::info!("Fetch queue holds {} record(s)", snapshot.len());
        for datum in &snapshot {
            tracing::info!("  queued: {}", datum.brief_info());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = FetchQueue::new();
        queue.push(CrawlDatum::new("a"));
        queue.push(CrawlDatum::new("b"));
        assert_eq!(queue.pop().map(|d| d.url().to_string()), Some("a".to_string()));
        assert_eq!(queue.pop().map(|d| d.url().to_string()), Some("b".to_string()));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_snapshot_does_not_consume() {
        let queue = FetchQueue::new();
        queue.push(CrawlDatum::new("a"));
        assert_eq!(queue.snapshot().len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_and_clear() {
        let queue = FetchQueue::new();
        queue.push(CrawlDatum::new("a"));
        queue.push(CrawlDatum::new("b"));
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());

        queue.push(CrawlDatum::new("c"));
        assert_eq!(queue.clear(), 1);
        assert_eq!(queue.peak_len(), 2);
    }

    #[test]
    fn test_concurrent_pops_deliver_each_item_once() {
        let queue = Arc::new(FetchQueue::new());
        for i in 0..1000 {
            queue.push(CrawlDatum::new(format!("u{}", i)));
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Some(d) = queue.pop() {
                        got.push(d.url().to_string());
                    }
                    got
                })
            })
            .collect();

        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }
}
