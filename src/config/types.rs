use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Frontier Mesh
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub frontier: FrontierConfig,
    pub queue: QueueConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    pub indexer: IndexerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Coordinator behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FrontierConfig {
    /// Seed URLs, each starting a crawl branch at depth 0
    pub seeds: Vec<String>,

    /// Maximum depth to crawl from seed URLs
    #[serde(rename = "depth-limit")]
    pub depth_limit: u32,

    /// Only follow links on the seed's own domain
    #[serde(rename = "same-origin", default = "default_true")]
    pub same_origin: bool,

    /// URL and domain patterns that must never be fetched (`*` is a wildcard)
    #[serde(default)]
    pub restricted: Vec<String>,

    /// Consecutive empty polling rounds before the run is declared complete
    #[serde(rename = "idle-rounds", default = "default_idle_rounds")]
    pub idle_rounds: u32,

    /// Length of one polling round (seconds)
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Log a progress line every N results
    #[serde(rename = "progress-every", default = "default_progress_every")]
    pub progress_every: u64,
}

impl FrontierConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Broker configuration shared by every process
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Path to the SQLite broker database
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,

    /// Long-poll wait of worker receives (seconds)
    #[serde(rename = "wait-secs", default = "default_wait_secs")]
    pub wait_secs: u64,

    /// Maximum messages taken per receive
    #[serde(rename = "max-messages", default = "default_max_messages")]
    pub max_messages: usize,

    /// How long a received message stays hidden before redelivery (seconds)
    #[serde(
        rename = "visibility-timeout-secs",
        default = "default_visibility_timeout_secs"
    )]
    pub visibility_timeout_secs: u64,

    /// How long a dedup key suppresses repeated sends (seconds)
    #[serde(rename = "dedup-window-secs", default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
}

impl QueueConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }
}

/// Crawl worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delay between consecutive task pulls of one worker (milliseconds)
    #[serde(rename = "pull-delay-ms", default = "default_pull_delay_ms")]
    pub pull_delay_ms: u64,

    /// Minimum spacing of requests to one domain across all workers (milliseconds)
    #[serde(rename = "domain-delay-ms", default = "default_domain_delay_ms")]
    pub domain_delay_ms: u64,

    /// Maximum characters of page text carried in a document
    #[serde(rename = "max-content-chars", default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            pull_delay_ms: default_pull_delay_ms(),
            domain_delay_ms: default_domain_delay_ms(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pull_delay(&self) -> Duration {
        Duration::from_millis(self.pull_delay_ms)
    }

    pub fn domain_delay(&self) -> Duration {
        Duration::from_millis(self.domain_delay_ms)
    }
}

/// Settings shared by both worker roles
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerConfig {
    /// Consecutive empty polls after which a worker exits on its own (0 disables)
    #[serde(rename = "idle-exit-rounds", default)]
    pub idle_exit_rounds: u32,
}

/// Index worker and document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    /// Path to the SQLite document store
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,

    /// First retry delay of a failed store write (milliseconds)
    #[serde(rename = "retry-base-ms", default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Store attempts per document, the first included
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "summary-max-chars", default = "default_summary_max_chars")]
    pub summary_max_chars: usize,

    /// How far past the maximum a sentence end is looked for
    #[serde(rename = "summary-lookahead", default = "default_summary_lookahead")]
    pub summary_lookahead: usize,

    #[serde(rename = "keyword-count", default = "default_keyword_count")]
    pub keyword_count: usize,
}

impl IndexerConfig {
    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
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

impl UserAgentConfig {
    /// Formats the identifying client signature sent with every request
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

fn default_true() -> bool {
    true
}

fn default_idle_rounds() -> u32 {
    30
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_progress_every() -> u64 {
    25
}

fn default_wait_secs() -> u64 {
    5
}

fn default_max_messages() -> usize {
    10
}

fn default_visibility_timeout_secs() -> u64 {
    60
}

fn default_dedup_window_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_pull_delay_ms() -> u64 {
    2000
}

fn default_domain_delay_ms() -> u64 {
    1000
}

fn default_max_content_chars() -> usize {
    1000
}

fn default_retry_base_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_summary_max_chars() -> usize {
    200
}

fn default_summary_lookahead() -> usize {
    50
}

fn default_keyword_count() -> usize {
    10
}
