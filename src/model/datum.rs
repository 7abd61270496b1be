//! The crawl record: the atomic unit of frontier state

use crate::state::CrawlStatus;
use crate::url::compile_full_match;
use crate::ConfigResult;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt::Write as _;

/// Sentinel HTTP code for a record that has not been fetched
pub const CODE_NOT_SET: i32 = -1;

/// Reserved metadata key holding the declared record type
pub const META_KEY_TYPE: &str = "type";

/// A single crawl record
///
/// The dedup identity is [`CrawlDatum::key`], which falls back to the URL
/// when no explicit key was set. Two records with the same URL but different
/// keys are distinct frontier entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlDatum {
    url: String,
    key: Option<String>,
    status: CrawlStatus,
    http_code: i32,
    location: Option<String>,
    execute_count: u32,
    execute_time: Option<DateTime<Utc>>,
    metadata: Map<String, Value>,
}

impl CrawlDatum {
    /// Creates an unexecuted record keyed by its URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: None,
            status: CrawlStatus::Unexecuted,
            http_code: CODE_NOT_SET,
            location: None,
            execute_count: 0,
            execute_time: None,
            metadata: Map::new(),
        }
    }

    /// Creates a record with an explicit dedup key
    pub fn with_key(url: impl Into<String>, key: impl Into<String>) -> Self {
        let mut datum = Self::new(url);
        datum.set_key(key);
        datum
    }

    /// Builder form of [`CrawlDatum::set_type`]
    pub fn typed(mut self, type_: impl Into<String>) -> Self {
        self.set_type(type_);
        self
    }

    /// Builder form of [`CrawlDatum::set_meta`]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_meta(key, value);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Dedup identity; never empty when the URL is not
    pub fn key(&self) -> &str {
        match &self.key {
            Some(k) if !k.is_empty() => k,
            _ => &self.url,
        }
    }

    /// Sets the dedup key; an empty key resets it to the URL
    pub fn set_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.key = if key.is_empty() { None } else { Some(key) };
    }

    /// Explicit key, if one was set
    pub fn raw_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn status(&self) -> CrawlStatus {
        self.status
    }

    pub fn set_status(&mut self, status: CrawlStatus) {
        self.status = status;
    }

    pub fn code(&self) -> i32 {
        self.http_code
    }

    pub fn set_code(&mut self, code: i32) {
        self.http_code = code;
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn set_location(&mut self, location: Option<String>) {
        self.location = location;
    }

    pub fn execute_count(&self) -> u32 {
        self.execute_count
    }

    pub fn set_execute_count(&mut self, count: u32) {
        self.execute_count = count;
    }

    /// Records one more attempt on this record
    pub fn incr_execute_count(&mut self, by: u32) {
        self.execute_count = self.execute_count.saturating_add(by);
    }

    pub fn execute_time(&self) -> Option<DateTime<Utc>> {
        self.execute_time
    }

    pub fn set_execute_time(&mut self, time: Option<DateTime<Utc>>) {
        self.execute_time = time;
    }

    // ===== Metadata =====

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Map<String, Value>) {
        self.metadata = metadata;
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn remove_meta(&mut self, key: &str) -> Option<Value> {
        self.metadata.remove(key)
    }

    /// String view of a metadata value; numbers and booleans are rendered
    pub fn meta_as_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Integer view of a metadata value, parsing strings when needed
    pub fn meta_as_i64(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn meta_as_bool(&self, key: &str) -> Option<bool> {
        match self.metadata.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Declared record type, read from the reserved `type` metadata key
    pub fn type_(&self) -> Option<String> {
        self.meta_as_str(META_KEY_TYPE)
    }

    pub fn set_type(&mut self, type_: impl Into<String>) {
        self.set_meta(META_KEY_TYPE, type_.into());
    }

    /// Checks whether the declared type equals `type_`
    pub fn match_type(&self, type_: &str) -> bool {
        self.type_().as_deref() == Some(type_)
    }

    /// Checks whether the whole URL matches `pattern`
    pub fn match_url(&self, pattern: &str) -> ConfigResult<bool> {
        Ok(compile_full_match(pattern)?.is_match(&self.url))
    }

    /// One-line summary used in per-record log lines
    ///
    /// Rendered as `[code -> location] Key: key (URL: url)`; the bracket is
    /// omitted for unfetched records and the URL when it equals the key.
    pub fn brief_info(&self) -> String {
        let mut out = String::new();
        if self.http_code != CODE_NOT_SET {
            let _ = write!(out, "[{}", self.http_code);
            if let Some(location) = &self.location {
                let _ = write!(out, " -> {}", location);
            }
            out.push_str("] ");
        }
        let _ = write!(out, "Key: {}", self.key());
        if self.key() != self.url {
            let _ = write!(out, " (URL: {})", self.url);
        }
        out
    }

    /// Multi-line description used by the CLI dump
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "KEY: {}", self.key());
        let _ = writeln!(out, "URL: {}", self.url);
        let _ = writeln!(out, "STATUS: {}", self.status);
        match self.execute_time {
            Some(time) => {
                let _ = writeln!(out, "ExecuteTime: {}", time.format("%Y-%m-%d %H:%M:%S"));
            }
            None => out.push_str("ExecuteTime: never\n"),
        }
        let _ = writeln!(out, "ExecuteCount: {}", self.execute_count);
        let _ = writeln!(out, "Code: {}", self.http_code);
        if let Some(location) = &self.location {
            let _ = writeln!(out, "Location: {}", location);
        }
        for (index, (key, value)) in self.metadata.iter().enumerate() {
            let _ = writeln!(out, "Meta[{}]: {} = {}", index, key, value);
        }
        out
    }
}
