//! Crawler module: fetching and pipeline orchestration
//!
//! This module contains the moving parts of a run, including:
//! - HTTP fetching with classified errors and a retry policy
//! - The shared frontier and per-host rate limiting
//! - Worker tasks that fetch and parse pages
//! - The coordinator that owns the entity table and the resumption store

mod coordinator;
mod fetcher;
mod scheduler;
mod worker;

pub use coordinator::{run_harvest, Coordinator, RunOutcome};
pub use fetcher::{
    build_http_client, classify_status, user_agent_string, FetchError, FetchErrorKind, Fetcher,
    RawPage, RetryDecision, RetryPolicy, MAX_BACKOFF,
};
pub use scheduler::{Frontier, QueuedPage, RateLimiter};
pub use worker::WorkerEvent;
