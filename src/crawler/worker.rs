//! Worker tasks: fetch, retry, parse
//!
//! A worker owns nothing but handles to shared services. It reports every
//! state change to the coordinator over a channel and never touches the
//! entity table or the resumption store itself.

use crate::crawler::fetcher::{FetchError, Fetcher, RetryDecision, RetryPolicy};
use crate::crawler::scheduler::{Frontier, QueuedPage};
use crate::parser::{ParseContext, ParseError, ParsedPage, ParserRegistry};
use crate::source::PageDescriptor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// What a worker tells the coordinator
#[derive(Debug)]
pub enum WorkerEvent {
    /// A fetch attempt started; `attempts` includes it
    Fetching {
        descriptor: PageDescriptor,
        attempts: u32,
    },

    /// An attempt failed transiently and will be retried after `delay`
    Retrying {
        descriptor: PageDescriptor,
        attempts: u32,
        delay: Duration,
        error: FetchError,
    },

    /// The page was fetched and parsed
    Parsed {
        descriptor: PageDescriptor,
        attempts: u32,
        parsed: ParsedPage,
    },

    /// The page was fetched but its structure was unusable
    ParseFailed {
        descriptor: PageDescriptor,
        attempts: u32,
        error: ParseError,
    },

    /// The fetch failed permanently
    FetchFailed {
        descriptor: PageDescriptor,
        attempts: u32,
        error: FetchError,
    },

    /// The run was cancelled while this page waited out a backoff
    Abandoned {
        descriptor: PageDescriptor,
        attempts: u32,
    },
}

/// Shared services a worker needs
#[derive(Clone)]
pub struct WorkerContext {
    pub fetcher: Arc<Fetcher>,
    pub registry: Arc<ParserRegistry>,
    pub parse_context: Arc<ParseContext>,
    pub frontier: Arc<Frontier>,
    pub policy: RetryPolicy,
    pub events: UnboundedSender<WorkerEvent>,
    pub cancel: CancellationToken,
}

/// Runs one worker until the frontier is exhausted or the run is cancelled
pub async fn run_worker(id: usize, ctx: WorkerContext) {
    tracing::debug!("Worker {} started", id);

    while let Some(page) = ctx.frontier.next(&ctx.cancel).await {
        let event = process_page(&ctx, page).await;
        if ctx.events.send(event).is_err() {
            tracing::warn!("Worker {}: coordinator went away", id);
            break;
        }
    }

    tracing::debug!("Worker {} finished", id);
}

/// Drives one descriptor through fetch attempts and parsing
///
/// Intermediate events are sent directly; the terminal event is returned.
async fn process_page(ctx: &WorkerContext, page: QueuedPage) -> WorkerEvent {
    let descriptor = page.descriptor;
    let mut attempts = page.attempts;

    loop {
        attempts += 1;
        // A closed channel is noticed when the terminal event is sent
        let _ = ctx.events.send(WorkerEvent::Fetching {
            descriptor: descriptor.clone(),
            attempts,
        });

        let error = match ctx.fetcher.fetch(&descriptor).await {
            Ok(raw) => {
                return match ctx.registry.parse(&raw, &ctx.parse_context) {
                    Ok(parsed) => WorkerEvent::Parsed {
                        descriptor,
                        attempts,
                        parsed,
                    },
                    Err(error) => WorkerEvent::ParseFailed {
                        descriptor,
                        attempts,
                        error,
                    },
                };
            }
            Err(error) => error,
        };

        match ctx.policy.decide(attempts, &error) {
            RetryDecision::GiveUp => {
                return WorkerEvent::FetchFailed {
                    descriptor,
                    attempts,
                    error: error.escalate(attempts),
                };
            }
            RetryDecision::Retry(delay) => {
                let _ = ctx.events.send(WorkerEvent::Retrying {
                    descriptor: descriptor.clone(),
                    attempts,
                    delay,
                    error,
                });

                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        return WorkerEvent::Abandoned { descriptor, attempts };
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
