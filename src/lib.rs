//! crawl-frontier: a resumable crawl frontier and fetch scheduler
//!
//! This crate persists crawl records across runs, generates pending work for
//! each fetch cycle, feeds a bounded queue, and drives a pool of workers that
//! invoke caller-supplied fetch logic. Newly discovered records are folded back
//! into the frontier between cycles.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawl-frontier operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cycle aborted: {0}")]
    CycleAborted(String),
}

/// Configuration-specific errors
///
/// These are raised before any fetching starts: a misconfigured crawl never
/// begins a cycle.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },

    #[error("No executor configured for the fetch cycle")]
    MissingExecutor,

    #[error("Handler registered more than once: {0}")]
    DuplicateHandler(String),

    #[error("No default visit handler registered")]
    MissingDefaultHandler,
}

/// Result type alias for crawl-frontier operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{CrawlDatum, CrawlDatums, Page};
pub use state::CrawlStatus;
pub use url::RegexRule;
