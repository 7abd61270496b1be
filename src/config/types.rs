use crate::crawler::{GeneratorOptions, SchedulerOptions};
use crate::url::RegexRule;
use crate::ConfigResult;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for crawl-frontier
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub seeds: SeedsConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

impl Config {
    /// Runtime scheduler knobs derived from `[crawler]` and `[scheduler]`
    pub fn scheduler_options(&self) -> SchedulerOptions {
        let s = &self.scheduler;
        SchedulerOptions {
            threads: self.crawler.threads as usize,
            queue_depth: s.queue_depth,
            hang_timeout: Duration::from_secs(s.hang_timeout_secs),
            drain_timeout: Duration::from_secs(s.drain_timeout_secs),
            execute_interval: Duration::from_millis(s.execute_interval_ms),
            monitor_interval: Duration::from_millis(s.monitor_interval_ms),
            spin_wait: Duration::from_millis(s.spin_wait_ms),
            feeder_poll: Duration::from_millis(s.feeder_poll_ms),
        }
    }

    /// Generator caps; zero in the file means unlimited
    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            top_n: Some(self.generator.top_n).filter(|&n| n > 0),
            max_execute_count: Some(self.generator.max_execute_count).filter(|&n| n > 0),
            ..GeneratorOptions::default()
        }
    }

    /// Compiles `[rules] patterns`
    pub fn link_rule(&self) -> ConfigResult<RegexRule> {
        RegexRule::from_rules(&self.rules.patterns)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of fetch cycles to run
    #[serde(default = "default_depth")]
    pub depth: u32,

    /// Number of worker tasks
    #[serde(default = "default_threads")]
    pub threads: u32,

    /// Keep the store from earlier runs instead of clearing it
    #[serde(default)]
    pub resumable: bool,

    /// Follow links matching `[rules]` from every HTML page
    #[serde(rename = "auto-parse", default = "default_true")]
    pub auto_parse: bool,

    /// Drop discovered links deeper than this
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Also follow `<img src>` targets when auto-parsing
    #[serde(rename = "parse-img", default)]
    pub parse_img: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            threads: default_threads(),
            resumable: false,
            auto_parse: true,
            max_depth: None,
            parse_img: false,
        }
    }
}

/// Fetch cycle timing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(rename = "queue-depth", default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Abort a cycle when nothing was dequeued for this long
    #[serde(rename = "hang-timeout-secs", default = "default_timeout_secs")]
    pub hang_timeout_secs: u64,

    /// How long a stopping cycle waits for busy workers
    #[serde(rename = "drain-timeout-secs", default = "default_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Pause after each record, per worker
    #[serde(rename = "execute-interval-ms", default)]
    pub execute_interval_ms: u64,

    #[serde(rename = "monitor-interval-ms", default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,

    #[serde(rename = "spin-wait-ms", default = "default_spin_wait_ms")]
    pub spin_wait_ms: u64,

    #[serde(rename = "feeder-poll-ms", default = "default_feeder_poll_ms")]
    pub feeder_poll_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            hang_timeout_secs: default_timeout_secs(),
            drain_timeout_secs: default_timeout_secs(),
            execute_interval_ms: 0,
            monitor_interval_ms: default_monitor_interval_ms(),
            spin_wait_ms: default_spin_wait_ms(),
            feeder_poll_ms: default_feeder_poll_ms(),
        }
    }
}

/// Generator caps; `0` means unlimited
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratorConfig {
    #[serde(rename = "top-n", default)]
    pub top_n: u64,

    #[serde(rename = "max-execute-count", default)]
    pub max_execute_count: u32,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "timeout-secs", default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Refuse plain-HTTP URLs
    #[serde(rename = "https-only", default = "default_true")]
    pub https_only: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            https_only: true,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Seed URLs injected at the start of a crawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedsConfig {
    /// Injected only when their key is not already known
    #[serde(default)]
    pub urls: Vec<String>,

    /// Injected over any existing record with the same key
    #[serde(default)]
    pub forced: Vec<String>,
}

/// Link rule for auto-parsing, `+pattern` / `-pattern` per entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub patterns: Vec<String>,
}

fn default_depth() -> u32 {
    1
}

fn default_threads() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

fn default_queue_depth() -> usize {
    1000
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_monitor_interval_ms() -> u64 {
    1000
}

fn default_spin_wait_ms() -> u64 {
    500
}

fn default_feeder_poll_ms() -> u64 {
    1000
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}
