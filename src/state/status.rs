/// Crawl record status definitions
///
/// This module defines the lifecycle status a crawl record can be in.
use std::fmt;

/// Represents the persisted status of a crawl record
///
/// A record is created `Unexecuted` and moves to `Success` or `Failed`
/// once per fetch cycle. A failed record stays eligible for generation in
/// later cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlStatus {
    /// Record is known but has not been successfully fetched yet
    #[default]
    Unexecuted,

    /// Record was fetched and handled without error
    Success,

    /// Last attempt on this record returned an error
    Failed,
}

impl CrawlStatus {
    /// Returns true if a generator may hand this record out again
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Unexecuted | Self::Failed)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unexecuted => "unexecuted",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unexecuted" => Some(Self::Unexecuted),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![Self::Unexecuted, Self::Success, Self::Failed]
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
