use std::time::{Duration, Instant};

/// Tracks the request slot of one host during a run
///
/// Used by the rate limiter to enforce a minimum interval between requests
/// to the same host.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests made to this host in the current session
    pub request_count: u64,

    /// When the most recently reserved request slot starts
    pub last_request_time: Option<Instant>,
}

impl HostState {
    /// Creates a new HostState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if a request can be made to this host at `now`
    pub fn can_request(&self, interval: Duration, now: Instant) -> bool {
        self.time_until_next_request(interval, now).is_none()
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, interval: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let ready_at = last + interval;
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Reserves the next request slot and returns how long to wait for it
    ///
    /// The slot is claimed immediately, so concurrent callers that reserve
    /// one after another get slots spaced `interval` apart instead of all
    /// firing once the current wait elapses.
    pub fn reserve_slot(&mut self, interval: Duration, now: Instant) -> Duration {
        let wait = self.time_until_next_request(interval, now).unwrap_or_default();
        self.request_count += 1;
        self.last_request_time = Some(now + wait);
        wait
    }
}
