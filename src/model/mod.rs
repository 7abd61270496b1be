//! Data model for crawl records
//!
//! - `CrawlDatum`: one frontier entry (URL, key, status, counters, metadata)
//! - `CrawlDatums`: an ordered batch of records produced by one fetch step
//! - `Page`: a fetched response tied to the record that produced it

mod datum;
mod datums;
mod page;

pub use datum::{CrawlDatum, CODE_NOT_SET, META_KEY_TYPE};
pub use datums::CrawlDatums;
pub use page::Page;
