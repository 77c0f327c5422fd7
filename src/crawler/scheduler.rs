//! Frontier and rate limiting shared by the worker pool
//!
//! This module handles:
//! - The priority queue of page descriptors waiting for a worker
//! - Once-per-run deduplication of descriptor keys
//! - Detecting frontier exhaustion (nothing queued, nothing in flight)
//! - Per-host minimum intervals between requests

use crate::source::PageDescriptor;
use crate::state::HostState;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A descriptor queued for fetching with priority information
#[derive(Debug, Clone)]
pub struct QueuedPage {
    /// The page to fetch
    pub descriptor: PageDescriptor,

    /// Attempts already spent on this descriptor (non-zero after a resume)
    pub attempts: u32,

    /// Priority value (lower is higher priority)
    pub priority: u32,

    /// Enqueue order, so equal priorities are served first-in first-out
    seq: u64,
}

// Lower priority values have higher priority (are popped first from BinaryHeap)
impl Ord for QueuedPage {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedPage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedPage {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedPage {}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: BinaryHeap<QueuedPage>,
    seen: HashSet<String>,
    in_flight: usize,
    next_seq: u64,
}

/// The shared work queue
///
/// Workers pull from it; only the coordinator pushes. A popped page counts
/// as in flight until the coordinator calls [`Frontier::complete`] for it,
/// which happens after its discovered descriptors have been pushed. The
/// frontier is exhausted when nothing is queued and nothing is in flight.
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a descriptor unless its key was already seen this run
    ///
    /// Returns true if the descriptor was queued.
    pub fn push(&self, descriptor: PageDescriptor, attempts: u32) -> bool {
        {
            let mut inner = self.lock();
            if !inner.seen.insert(descriptor.key()) {
                return false;
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.queue.push(QueuedPage {
                priority: descriptor.kind.priority(),
                descriptor,
                attempts,
                seq,
            });
        }
        self.notify.notify_waiters();
        true
    }

    /// Puts an abandoned in-flight page back in the queue
    ///
    /// The key is already seen, so this bypasses deduplication. It also
    /// releases the page's in-flight slot.
    pub fn requeue(&self, descriptor: PageDescriptor, attempts: u32) {
        {
            let mut inner = self.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.queue.push(QueuedPage {
                priority: descriptor.kind.priority(),
                descriptor,
                attempts,
                seq,
            });
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Records a key as known without queueing it (finished pages on resume)
    pub fn mark_seen(&self, key: String) {
        self.lock().seen.insert(key);
    }

    pub fn is_seen(&self, key: &str) -> bool {
        self.lock().seen.contains(key)
    }

    /// Pops the highest-priority page and marks it in flight
    pub fn try_pop(&self) -> Option<QueuedPage> {
        let mut inner = self.lock();
        let page = inner.queue.pop()?;
        inner.in_flight += 1;
        Some(page)
    }

    /// Marks one in-flight page as finished
    pub fn complete(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Returns true when nothing is queued and nothing is in flight
    pub fn is_exhausted(&self) -> bool {
        let inner = self.lock();
        inner.queue.is_empty() && inner.in_flight == 0
    }

    /// Number of queued (not in-flight) pages
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Waits for the next page
    ///
    /// Returns None once the run is cancelled or the frontier is exhausted.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<QueuedPage> {
        loop {
            // Register interest before checking, so a push between the
            // check and the await still wakes us
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if cancel.is_cancelled() {
                return None;
            }

            {
                let mut inner = self.lock();
                if let Some(page) = inner.queue.pop() {
                    inner.in_flight += 1;
                    return Some(page);
                }
                if inner.in_flight == 0 {
                    return None;
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }
}

/// Per-host request spacing shared by all workers
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `host` is allowed
    ///
    /// The slot is reserved before sleeping, so concurrent callers queue up
    /// one interval apart.
    pub async fn acquire(&self, host: &str) {
        let wait = {
            let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
            hosts
                .entry(host.to_string())
                .or_insert_with(HostState::new)
                .reserve_slot(self.interval, Instant::now())
        };

        if !wait.is_zero() {
            tracing::trace!("Waiting {:?} for host {}", wait, host);
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests made to a host so far
    pub fn request_count(&self, host: &str) -> u64 {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .map_or(0, |state| state.request_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PageKind;
    use std::sync::Arc;

    fn detail(model: &str) -> PageDescriptor {
        PageDescriptor::detail(PageKind::DiscDetail, model)
    }

    #[test]
    fn test_new_frontier() {
        let frontier = Frontier::new();
        assert_eq!(frontier.len(), 0);
        assert!(frontier.is_empty());
        assert!(frontier.is_exhausted());
    }

    #[test]
    fn test_push_deduplicates_by_key() {
        let frontier = Frontier::new();

        assert!(frontier.push(detail("destroyer"), 0));
        assert!(!frontier.push(detail("destroyer"), 0));
        assert_eq!(frontier.len(), 1);

        frontier.mark_seen(detail("buzzz").key());
        assert!(!frontier.push(detail("buzzz"), 0));
        assert!(frontier.is_seen(&detail("buzzz").key()));
    }

    #[test]
    fn test_index_pages_before_detail_pages() {
        let frontier = Frontier::new();
        frontier.push(detail("destroyer"), 0);
        frontier.push(detail("buzzz"), 0);
        frontier.push(PageDescriptor::index(PageKind::DiscIndex, 1), 0);

        let order: Vec<String> = std::iter::from_fn(|| frontier.try_pop())
            .map(|page| page.descriptor.key())
            .collect();

        assert_eq!(
            order,
            vec![
                "disc_index?page=1".to_string(),
                "disc_detail/destroyer".to_string(),
                "disc_detail/buzzz".to_string(),
            ]
        );
    }

    #[test]
    fn test_in_flight_blocks_exhaustion() {
        let frontier = Frontier::new();
        frontier.push(detail("destroyer"), 2);

        let page = frontier.try_pop().unwrap();
        assert_eq!(page.attempts, 2);
        assert!(frontier.is_empty());
        assert!(!frontier.is_exhausted());

        frontier.complete();
        assert!(frontier.is_exhausted());
    }

    #[test]
    fn test_requeue_keeps_frontier_open() {
        let frontier = Frontier::new();
        frontier.push(detail("destroyer"), 0);
        let page = frontier.try_pop().unwrap();

        frontier.requeue(page.descriptor, 2);

        assert_eq!(frontier.in_flight(), 0);
        assert!(!frontier.is_exhausted());
        assert_eq!(frontier.try_pop().unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_next_empty_frontier() {
        let frontier = Frontier::new();
        let cancel = CancellationToken::new();

        assert!(frontier.next(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn test_next_stops_on_cancel() {
        let frontier = Frontier::new();
        frontier.push(detail("destroyer"), 0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(frontier.next(&cancel).await.is_none());
        assert_eq!(frontier.len(), 1);
    }

    #[tokio::test]
    async fn test_next_waits_for_discovered_pages() {
        let frontier = Arc::new(Frontier::new());
        let cancel = CancellationToken::new();
        frontier.push(PageDescriptor::index(PageKind::DiscIndex, 0), 0);
        let listing = frontier.try_pop().unwrap();
        assert_eq!(listing.descriptor.page, 0);

        let waiter = {
            let frontier = Arc::clone(&frontier);
            let cancel = cancel.clone();
            tokio::spawn(async move { frontier.next(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.push(detail("destroyer"), 0);
        frontier.complete();

        let page = waiter.await.unwrap().unwrap();
        assert_eq!(page.descriptor, detail("destroyer"));
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();

        limiter.acquire("www.pdga.com").await;
        limiter.acquire("www.pdga.com").await;
        limiter.acquire("other.example").await;

        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(limiter.request_count("www.pdga.com"), 2);
        assert_eq!(limiter.request_count("other.example"), 1);
        assert_eq!(limiter.request_count("unknown"), 0);
    }
}
