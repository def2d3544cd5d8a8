use tokio::time::{Duration, Instant};

/// Tracks request timing for one remote endpoint category
///
/// This structure maintains the per-endpoint information the rate gate
/// needs: when the last request went out and how many were made.
#[derive(Debug, Clone, Default)]
pub struct EndpointState {
    /// Number of requests made to this endpoint in the current process
    pub request_count: u64,

    /// Timestamp of the last request to this endpoint
    pub last_request_time: Option<Instant>,

    /// Number of throttle responses received from this endpoint
    pub throttle_count: u64,
}

impl EndpointState {
    /// Records that a request was made to this endpoint
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Records that this endpoint answered with a throttle
    pub fn record_throttle(&mut self) {
        self.throttle_count += 1;
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < delay {
            Some(delay - elapsed)
        } else {
            None
        }
    }
}
