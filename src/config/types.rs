use crate::source::Category;
use serde::Deserialize;

/// Main configuration structure for Disc-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default, rename = "company-alias")]
    pub company_aliases: Vec<AliasEntry>,
}

/// Which parts of the source site to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Site root every page descriptor is resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Crawl categories to include
    pub categories: Vec<Category>,

    /// PDGA member numbers to fetch when the `players` category is enabled
    #[serde(rename = "player-ids", default)]
    pub player_ids: Vec<u32>,

    /// Event (tournament) IDs to fetch when the `events` category is enabled
    #[serde(rename = "event-ids", default)]
    pub event_ids: Vec<u32>,
}

/// Fetcher behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Maximum number of fetch attempts per page descriptor
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(rename = "rate-limit-interval")]
    pub rate_limit_interval: u64,

    /// Number of concurrent fetch workers
    #[serde(rename = "worker-count")]
    pub worker_count: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Base delay for exponential retry backoff (milliseconds)
    #[serde(rename = "backoff-base", default = "default_backoff_base")]
    pub backoff_base: u64,
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

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding run state and loaded records
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown run summary
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// Run control configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Resume an unfinished run instead of starting over
    #[serde(default = "default_resume")]
    pub resume: bool,

    /// Halt cleanly after this many pages complete in one session
    #[serde(rename = "page-budget", default)]
    pub page_budget: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            resume: default_resume(),
            page_budget: None,
        }
    }
}

/// Rewrites one spelling of a company name to its canonical form
#[derive(Debug, Clone, Deserialize)]
pub struct AliasEntry {
    pub from: String,
    pub to: String,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_backoff_base() -> u64 {
    500
}

fn default_resume() -> bool {
    true
}
