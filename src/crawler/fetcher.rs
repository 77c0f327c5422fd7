//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the pipeline, including:
//! - Building HTTP clients with proper user agent strings
//! - Per-host rate limiting before every attempt
//! - Error classification into transient and permanent failures
//! - The retry policy that drives the `Retrying` state
//!
//! The fetcher performs exactly one attempt per call. Whether a failed
//! attempt is retried is decided by [`RetryPolicy`], so the retry loop can
//! live in the per-descriptor state machine.

use crate::config::{FetcherConfig, UserAgentConfig};
use crate::crawler::scheduler::RateLimiter;
use crate::source::{extract_host, PageDescriptor};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Upper bound on a single backoff delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// A successfully fetched page, ready for parsing
#[derive(Debug, Clone)]
pub struct RawPage {
    /// The descriptor this page was fetched for
    pub descriptor: PageDescriptor,

    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Page body content
    pub body: String,

    /// When the body finished downloading
    pub fetched_at: DateTime<Utc>,
}

/// Whether a failed fetch may succeed if tried again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Timeouts, connection errors, 5xx, 429, body read errors
    Transient,
    /// Client errors and exhausted retries
    Permanent,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// A failed fetch attempt
#[derive(Debug, Clone, Error)]
#[error("{kind} fetch error for {descriptor}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub descriptor: PageDescriptor,
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn transient(descriptor: &PageDescriptor, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Transient,
            descriptor: descriptor.clone(),
            status,
            message: message.into(),
        }
    }

    pub fn permanent(descriptor: &PageDescriptor, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Permanent,
            descriptor: descriptor.clone(),
            status,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }

    /// Turns a transient error into a permanent one once retries run out
    pub fn escalate(self, attempts: u32) -> Self {
        match self.kind {
            FetchErrorKind::Permanent => self,
            FetchErrorKind::Transient => Self {
                kind: FetchErrorKind::Permanent,
                message: format!("{} (gave up after {} attempts)", self.message, attempts),
                ..self
            },
        }
    }
}

/// Classifies a non-success HTTP status
///
/// | Status | Kind |
/// |--------|------|
/// | 429 | Transient |
/// | 5xx | Transient |
/// | other 4xx | Permanent |
/// | anything else non-2xx | Permanent |
pub fn classify_status(status: StatusCode) -> FetchErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchErrorKind::Transient
    } else {
        FetchErrorKind::Permanent
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use disc_harvest::config::UserAgentConfig;
/// use disc_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "DiscHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Format: CrawlerName/Version (+ContactURL; ContactEmail)
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Performs single fetch attempts against the source site
pub struct Fetcher {
    client: Client,
    base_url: Url,
    limiter: Arc<RateLimiter>,
}

impl Fetcher {
    pub fn new(client: Client, base_url: Url, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            base_url,
            limiter,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches one descriptor, waiting for the host's rate-limit slot first
    ///
    /// # Returns
    ///
    /// * `Ok(RawPage)` - 2xx response with a readable body
    /// * `Err(FetchError)` - Classified failure; never retried here
    pub async fn fetch(&self, descriptor: &PageDescriptor) -> Result<RawPage, FetchError> {
        let url = descriptor
            .url(&self.base_url)
            .map_err(|e| FetchError::permanent(descriptor, None, e.to_string()))?;

        let host = extract_host(&url).unwrap_or_default();
        self.limiter.acquire(&host).await;

        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_request_error(descriptor, &e))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {}", status.as_u16());
            return Err(match classify_status(status) {
                FetchErrorKind::Transient => {
                    FetchError::transient(descriptor, Some(status.as_u16()), message)
                }
                FetchErrorKind::Permanent => {
                    FetchError::permanent(descriptor, Some(status.as_u16()), message)
                }
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| {
            FetchError::transient(
                descriptor,
                Some(status.as_u16()),
                format!("failed to read body: {}", e),
            )
        })?;

        Ok(RawPage {
            descriptor: descriptor.clone(),
            url: final_url,
            status: status.as_u16(),
            body,
            fetched_at: Utc::now(),
        })
    }
}

fn classify_request_error(descriptor: &PageDescriptor, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::transient(descriptor, None, "request timeout")
    } else if error.is_connect() {
        FetchError::transient(descriptor, None, format!("connection failed: {}", error))
    } else if error.is_builder() {
        FetchError::permanent(descriptor, None, error.to_string())
    } else {
        FetchError::transient(descriptor, None, error.to_string())
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then fetch again
    Retry(Duration),
    /// Record the descriptor as permanently failed
    GiveUp,
}

/// Exponential backoff bounded by a total attempt count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per descriptor, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_base),
        }
    }

    /// Delay before attempt `attempts + 1`: `base * 2^(attempts-1)`, capped
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// Decides whether to retry after `attempts` attempts ended in `error`
    pub fn decide(&self, attempts: u32, error: &FetchError) -> RetryDecision {
        if !error.is_transient() || attempts >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.backoff(attempts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PageKind;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn descriptor() -> PageDescriptor {
        PageDescriptor::detail(PageKind::DiscDetail, "destroyer")
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_config(), Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_user_agent_format() {
        assert_eq!(
            user_agent_string(&create_test_config()),
            "TestHarvester/1.0 (+https://example.com/about; admin@example.com)"
        );
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::NOT_FOUND), FetchErrorKind::Permanent);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), FetchErrorKind::Permanent);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            FetchErrorKind::Transient
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            FetchErrorKind::Transient
        );
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(12), MAX_BACKOFF);
        assert_eq!(policy.backoff(40), MAX_BACKOFF);
    }

    #[test]
    fn test_decide_respects_attempt_bound() {
        let policy = policy();
        let err = FetchError::transient(&descriptor(), Some(503), "HTTP 503");

        assert_eq!(
            policy.decide(1, &err),
            RetryDecision::Retry(Duration::from_millis(500))
        );
        assert_eq!(
            policy.decide(2, &err),
            RetryDecision::Retry(Duration::from_millis(1000))
        );
        assert_eq!(policy.decide(3, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_permanent_errors_are_never_retried() {
        let err = FetchError::permanent(&descriptor(), Some(404), "HTTP 404");
        assert_eq!(policy().decide(1, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_escalate() {
        let err = FetchError::transient(&descriptor(), Some(500), "HTTP 500").escalate(3);
        assert_eq!(err.kind, FetchErrorKind::Permanent);
        assert_eq!(err.status, Some(500));
        assert!(err.message.contains("3 attempts"));

        let permanent = FetchError::permanent(&descriptor(), Some(404), "HTTP 404");
        assert_eq!(permanent.clone().escalate(1).message, permanent.message);
    }
}
