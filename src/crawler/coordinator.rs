//! Pipeline coordinator - main harvest orchestration logic
//!
//! This module contains the coordinator task that ties the pipeline
//! together, including:
//! - Opening the resumption store and deciding between a fresh and a resumed run
//! - Seeding the frontier and replaying the candidate journal
//! - Spawning the worker pool and consuming its events
//! - Driving every descriptor through its state machine
//! - Streaming the finalized entity table to the sink
//!
//! The coordinator is the single writer of both the entity table and the
//! resumption store. Workers only report what happened.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, Fetcher, RetryPolicy};
use crate::crawler::scheduler::{Frontier, RateLimiter};
use crate::crawler::worker::{run_worker, WorkerContext, WorkerEvent};
use crate::model::{CandidateRecord, CompanyAliases, Stamp};
use crate::output::{load_into, FailedPage, LoadReport, RunSummary, Sink};
use crate::parser::{ParseContext, ParsedPage, ParserRegistry};
use crate::reconcile::{FinalizedTable, Reconciler};
use crate::source::PageDescriptor;
use crate::state::PageState;
use crate::storage::{RunStatus, SqliteStorage, Storage};
use crate::HarvestError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Failure reason for pages whose attempts ran out in an earlier session
const RESUME_BUDGET_EXHAUSTED: &str = "retry budget exhausted before resume";

/// How a session ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The frontier was exhausted and the sink accepted the whole table
    Completed(RunSummary),

    /// The run was cancelled or hit its page budget; resumable
    Halted(RunSummary),
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            Self::Completed(summary) | Self::Halted(summary) => summary,
        }
    }

    pub fn into_summary(self) -> RunSummary {
        match self {
            Self::Completed(summary) | Self::Halted(summary) => summary,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Main pipeline coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SqliteStorage,
    run_id: i64,
    config_hash: String,
    started_at: String,
    resumed: bool,
    base_url: Url,
    frontier: Arc<Frontier>,
    reconciler: Reconciler,
    states: HashMap<String, PageState>,
    stamp: Stamp,

    // Session counters
    pages_fetched: u64,
    fetch_attempts: u64,
    pages_finished: u64,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The pipeline configuration
    /// * `config_hash` - Hash of the configuration file, recorded per run
    /// * `fresh` - Discard any unfinished run instead of resuming it
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to initialize
    pub fn new(config: Config, config_hash: &str, fresh: bool) -> Result<Self, HarvestError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Self::with_storage(config, storage, config_hash, fresh)
    }

    /// Creates a coordinator over an already opened store
    pub fn with_storage(
        config: Config,
        mut storage: SqliteStorage,
        config_hash: &str,
        fresh: bool,
    ) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.source.base_url)?;
        let resume = !fresh && config.run.resume;

        // Create or resume run
        let resumable = match storage.get_latest_run()? {
            Some(run) if resume && run.status != RunStatus::Completed => Some(run),
            _ => None,
        };

        let (run_id, started_at, resumed) = match resumable {
            Some(run) => {
                if run.config_hash != config_hash {
                    tracing::warn!(
                        "Configuration changed since run {} started; resuming anyway",
                        run.id
                    );
                }
                tracing::info!("Resuming {} run {}", run.status.to_db_string(), run.id);
                storage.update_run_status(run.id, RunStatus::Running)?;
                (run.id, run.started_at, true)
            }
            None => {
                storage.clear()?;
                let run_id = storage.create_run(config_hash)?;
                tracing::info!("Starting new run {}", run_id);
                let run = storage.get_run(run_id)?;
                (run_id, run.started_at, false)
            }
        };

        let frontier = Arc::new(Frontier::new());
        let mut reconciler = Reconciler::new();
        let mut states = HashMap::new();

        if resumed {
            let max_attempts = config.fetcher.max_retries;
            let mut reset = 0usize;
            let mut exhausted = 0usize;
            for record in storage.load_descriptors()? {
                let key = record.descriptor.key();
                if record.state.is_terminal() {
                    frontier.mark_seen(key.clone());
                    states.insert(key, record.state);
                    continue;
                }

                // A session that died during a page's last attempt leaves no
                // budget for another fetch
                if record.attempts >= max_attempts {
                    if record.state != PageState::Pending {
                        record.state.transition(&key, PageState::Failed)?;
                    }
                    tracing::warn!(
                        "{} used all {} attempts before the run was resumed",
                        key,
                        record.attempts
                    );
                    storage.fail_descriptor(
                        &key,
                        record.attempts,
                        record.status_code,
                        RESUME_BUDGET_EXHAUSTED,
                    )?;
                    frontier.mark_seen(key.clone());
                    states.insert(key, PageState::Failed);
                    exhausted += 1;
                    continue;
                }

                if record.state != PageState::Pending {
                    record.state.transition(&key, PageState::Pending)?;
                    storage.update_descriptor_state(&key, PageState::Pending, record.attempts)?;
                    reset += 1;
                }
                states.insert(key, PageState::Pending);
                frontier.push(record.descriptor, record.attempts);
            }

            let journal = storage.load_journal()?;
            tracing::info!(
                "Replaying {} journaled candidates; {} pages queued ({} reset to pending, {} out of attempts)",
                journal.len(),
                frontier.len(),
                reset,
                exhausted
            );
            reconciler.apply_all(&journal);
        }

        // Seeds not yet known to the store
        for category in &config.source.categories {
            for seed in category.seeds(&config.source) {
                if storage.enqueue_descriptor(&seed, run_id)? {
                    states.insert(seed.key(), PageState::Pending);
                    frontier.push(seed, 0);
                }
            }
        }

        let stamp = storage.max_stamp()?;

        Ok(Self {
            config: Arc::new(config),
            storage,
            run_id,
            config_hash: config_hash.to_string(),
            started_at,
            resumed,
            base_url,
            frontier,
            reconciler,
            states,
            stamp,
            pages_fetched: 0,
            fetch_attempts: 0,
            pages_finished: 0,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Pages waiting for a worker
    pub fn queued(&self) -> usize {
        self.frontier.len()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Current state of a descriptor, if it is known to this run
    pub fn page_state(&self, key: &str) -> Option<PageState> {
        self.states.get(key).copied()
    }

    /// Runs the pipeline until the frontier is exhausted or `cancel` fires
    ///
    /// On exhaustion the finalized table is streamed to `sink` as one load.
    /// A cancelled session leaves the sink untouched and the run resumable.
    /// A sink failure marks the run failed and returns the error; the
    /// resumption store is left as it was.
    pub async fn run<S: Sink + ?Sized>(
        &mut self,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, HarvestError> {
        let session_start = Instant::now();
        tracing::info!(
            "Run {}: {} pages queued, {} workers",
            self.run_id,
            self.frontier.len(),
            self.config.fetcher.worker_count
        );

        let config = Arc::clone(&self.config);
        let fetcher_config = &config.fetcher;
        let client = build_http_client(
            &self.config.user_agent,
            Duration::from_secs(fetcher_config.request_timeout),
        )?;
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(
            fetcher_config.rate_limit_interval,
        )));

        let (events, mut inbox) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            fetcher: Arc::new(Fetcher::new(client, self.base_url.clone(), limiter)),
            registry: Arc::new(ParserRegistry::new()),
            parse_context: Arc::new(ParseContext::new(
                self.base_url.clone(),
                CompanyAliases::from_entries(&self.config.company_aliases),
            )),
            frontier: Arc::clone(&self.frontier),
            policy: RetryPolicy::from_config(fetcher_config),
            events,
            cancel: cancel.clone(),
        };

        let workers: Vec<_> = (0..fetcher_config.worker_count as usize)
            .map(|id| tokio::spawn(run_worker(id, ctx.clone())))
            .collect();
        // Workers hold the only senders, so the inbox closes when they all exit
        drop(ctx);

        let mut failure = None;
        while let Some(event) = inbox.recv().await {
            if let Err(e) = self.handle_event(event, &cancel) {
                tracing::error!("Stopping run {}: {}", self.run_id, e);
                cancel.cancel();
                failure = Some(e);
                break;
            }
        }
        drop(inbox);

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        if let Some(e) = failure {
            self.storage
                .update_run_status(self.run_id, RunStatus::Interrupted)?;
            return Err(e);
        }

        let finalized = self.reconciler.finalize();
        for dangling in &finalized.dangling {
            tracing::warn!("Data quality: {}", dangling);
        }

        if cancel.is_cancelled() && !self.frontier.is_exhausted() {
            self.storage
                .update_run_status(self.run_id, RunStatus::Interrupted)?;
            let summary = self.summarize(
                RunStatus::Interrupted,
                session_start.elapsed(),
                &finalized,
                LoadReport::default(),
            )?;
            tracing::info!(
                "Run {} halted with {} pages queued; resume to continue",
                self.run_id,
                self.frontier.len()
            );
            summary.log();
            return Ok(RunOutcome::Halted(summary));
        }

        tracing::info!(
            "Frontier exhausted; streaming {} entities to the sink",
            finalized.entities.len()
        );
        match load_into(sink, &finalized.entities) {
            Ok(report) => {
                self.storage.complete_run(self.run_id)?;
                let summary = self.summarize(
                    RunStatus::Completed,
                    session_start.elapsed(),
                    &finalized,
                    report,
                )?;
                summary.log();
                Ok(RunOutcome::Completed(summary))
            }
            Err(e) => {
                self.storage.update_run_status(self.run_id, RunStatus::Failed)?;
                Err(HarvestError::Sink(e))
            }
        }
    }

    /// Applies one worker event to the state machine and the store
    fn handle_event(
        &mut self,
        event: WorkerEvent,
        cancel: &CancellationToken,
    ) -> Result<(), HarvestError> {
        match event {
            WorkerEvent::Fetching {
                descriptor,
                attempts,
            } => {
                let key = descriptor.key();
                self.fetch_attempts += 1;
                self.advance(&key, PageState::Fetching)?;
                self.storage
                    .update_descriptor_state(&key, PageState::Fetching, attempts)?;
            }

            WorkerEvent::Retrying {
                descriptor,
                attempts,
                delay,
                error,
            } => {
                let key = descriptor.key();
                tracing::warn!(
                    "{} (attempt {}); retrying in {:?}",
                    error,
                    attempts,
                    delay
                );
                self.advance(&key, PageState::Retrying)?;
                self.storage
                    .update_descriptor_state(&key, PageState::Retrying, attempts)?;
            }

            WorkerEvent::Parsed {
                descriptor,
                attempts,
                parsed,
            } => {
                self.pages_fetched += 1;
                self.complete_page(descriptor, attempts, parsed)?;
                self.finish_page(cancel);
            }

            WorkerEvent::ParseFailed {
                descriptor,
                attempts,
                error,
            } => {
                let key = descriptor.key();
                self.pages_fetched += 1;
                tracing::warn!("{}", error);
                self.advance(&key, PageState::Parsing)?;
                self.advance(&key, PageState::Failed)?;
                self.storage
                    .fail_descriptor(&key, attempts, None, &error.reason)?;
                self.finish_page(cancel);
            }

            WorkerEvent::FetchFailed {
                descriptor,
                attempts,
                error,
            } => {
                let key = descriptor.key();
                tracing::warn!("{}", error);
                self.advance(&key, PageState::Failed)?;
                self.storage
                    .fail_descriptor(&key, attempts, error.status, &error.message)?;
                self.finish_page(cancel);
            }

            WorkerEvent::Abandoned {
                descriptor,
                attempts,
            } => {
                let key = descriptor.key();
                tracing::debug!("Abandoned {} during backoff", key);
                self.advance(&key, PageState::Pending)?;
                self.storage
                    .update_descriptor_state(&key, PageState::Pending, attempts)?;
                self.frontier.requeue(descriptor, attempts);
            }
        }

        Ok(())
    }

    /// Journals, reconciles and expands the frontier for a parsed page
    fn complete_page(
        &mut self,
        descriptor: PageDescriptor,
        attempts: u32,
        mut parsed: ParsedPage,
    ) -> Result<(), HarvestError> {
        let key = descriptor.key();
        self.advance(&key, PageState::Parsing)?;

        self.stamp = self.stamp.next();
        let stamp = self.stamp;
        let discovered = std::mem::take(&mut parsed.discovered);
        let records: Vec<CandidateRecord> = parsed
            .into_iter()
            .map(|candidate| CandidateRecord::new(stamp, key.clone(), candidate))
            .collect();

        self.advance(&key, PageState::Reconciling)?;
        self.storage.complete_descriptor(
            &key,
            attempts,
            stamp,
            &records,
            &discovered,
            self.run_id,
        )?;
        self.reconciler.apply_all(&records);
        self.advance(&key, PageState::Done)?;

        let mut queued = 0;
        for next in discovered {
            let next_key = next.key();
            if self.frontier.push(next, 0) {
                self.states.insert(next_key, PageState::Pending);
                queued += 1;
            }
        }

        tracing::debug!(
            "Completed {} ({}): {} candidates, {} new pages",
            key,
            stamp,
            records.len(),
            queued
        );
        Ok(())
    }

    /// Releases a finished page and enforces the page budget
    fn finish_page(&mut self, cancel: &CancellationToken) {
        self.frontier.complete();
        self.pages_finished += 1;

        if self.pages_finished % 10 == 0 {
            tracing::info!(
                "Progress: {} pages finished this session, {} queued, {} in flight",
                self.pages_finished,
                self.frontier.len(),
                self.frontier.in_flight()
            );
        }

        if let Some(budget) = self.config.run.page_budget {
            if self.pages_finished >= budget && !cancel.is_cancelled() {
                tracing::info!("Page budget of {} reached; halting", budget);
                cancel.cancel();
            }
        }
    }

    fn advance(&mut self, key: &str, next: PageState) -> Result<(), HarvestError> {
        let current = self
            .states
            .get(key)
            .copied()
            .unwrap_or(PageState::Pending);
        let next = current.transition(key, next)?;
        self.states.insert(key.to_string(), next);
        Ok(())
    }

    fn summarize(
        &self,
        status: RunStatus,
        elapsed: Duration,
        finalized: &FinalizedTable,
        report: LoadReport,
    ) -> Result<RunSummary, HarvestError> {
        let failed = self
            .storage
            .get_descriptors_by_state(PageState::Failed)?
            .into_iter()
            .map(|record| FailedPage {
                key: record.descriptor.key(),
                kind: record.descriptor.kind,
                attempts: record.attempts,
                status: record.status_code,
                reason: record.error_message.unwrap_or_default(),
            })
            .collect();

        let mut pages_pending = 0;
        for state in PageState::all_states() {
            if state.is_active() {
                pages_pending += self.storage.count_by_state(state)?;
            }
        }

        let table = self.reconciler.table();
        Ok(RunSummary {
            run_id: self.run_id,
            status,
            config_hash: self.config_hash.clone(),
            started_at: self.started_at.clone(),
            elapsed,
            resumed: self.resumed,
            pages_fetched: self.pages_fetched,
            fetch_attempts: self.fetch_attempts,
            pages_done: self.storage.count_by_state(PageState::Done)?,
            pages_pending,
            failed,
            conflicts: self.reconciler.warnings().to_vec(),
            dangling: finalized.dangling.clone(),
            companies: table.company_count(),
            discs: table.disc_count(),
            players: table.player_count(),
            events: table.event_count(),
            upserted: report.upserted,
            unchanged: report.unchanged,
        })
    }
}

/// Runs the whole pipeline for a configuration
///
/// Resumes an unfinished run when the configuration allows it.
///
/// # Example
///
/// ```no_run
/// use disc_harvest::config::load_config_with_hash;
/// use disc_harvest::crawler::run_harvest;
/// use disc_harvest::MemorySink;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let mut sink = MemorySink::new();
/// let outcome = run_harvest(config, &hash, &mut sink, CancellationToken::new()).await?;
/// println!("{} entities", outcome.summary().entity_count());
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest<S: Sink + ?Sized>(
    config: Config,
    config_hash: &str,
    sink: &mut S,
    cancel: CancellationToken,
) -> Result<RunOutcome, HarvestError> {
    let mut coordinator = Coordinator::new(config, config_hash, false)?;
    coordinator.run(sink, cancel).await
}
