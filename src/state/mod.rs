//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlStatus`: persisted status of an individual crawl record
//! - `SchedulerState` / `FeederState`: in-memory lifecycle of one fetch cycle

mod lifecycle;
mod status;

// Re-export main types
pub use lifecycle::{AtomicFeederState, AtomicSchedulerState, FeederState, SchedulerState};
pub use status::CrawlStatus;
