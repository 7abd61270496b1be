//! Output module for reporting crawl state
//!
//! This module handles:
//! - Computing and printing crawl statistics
//! - Dumping frontier records

mod dump;
pub mod stats;

pub use dump::{print_records, write_records};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
