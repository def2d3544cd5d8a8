//! Per-endpoint request spacing
//!
//! The remote service enforces a separate budget for each call type, so each
//! endpoint category keeps its own timing state. A request is released only
//! once the endpoint's delay has elapsed since its previous request, which
//! keeps achieved throughput at or below quota.

use crate::config::{QuotaConfig, RateLimitsConfig};
use crate::state::EndpointState;
use std::collections::HashMap;
use std::fmt;
use tokio::time::{Duration, Instant};

/// Remote call categories with independent budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Neighbor-id listing
    GraphNeighbors,
    /// Bulk record lookup (also handle resolution)
    RecordLookup,
    /// Feed pages, cursor and legacy
    FeedListing,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Endpoint::GraphNeighbors => "graph-neighbors",
            Endpoint::RecordLookup => "record-lookup",
            Endpoint::FeedListing => "feed-listing",
        };
        f.write_str(name)
    }
}

/// Minimum spacing that keeps `quota_requests` per `window` within budget
///
/// A zero quota cannot be honored by any spacing; the whole window is
/// returned.
pub fn delay(quota_requests: u32, window: Duration) -> Duration {
    if quota_requests == 0 {
        return window;
    }
    window / quota_requests
}

fn quota_delay(quota: &QuotaConfig) -> Duration {
    delay(quota.requests, Duration::from_secs(quota.window_seconds))
        + Duration::from_millis(quota.padding_ms)
}

#[derive(Debug, Clone, Default)]
struct Slot {
    delay: Duration,
    state: EndpointState,
}

/// Blocks each remote call until its endpoint's budget allows it
#[derive(Debug, Clone, Default)]
pub struct RateGate {
    slots: HashMap<Endpoint, Slot>,
}

impl RateGate {
    /// Creates a gate with the configured per-endpoint quotas
    pub fn new(limits: &RateLimitsConfig) -> Self {
        Self::default()
            .with_delay(Endpoint::GraphNeighbors, quota_delay(&limits.graph_neighbors))
            .with_delay(Endpoint::RecordLookup, quota_delay(&limits.record_lookup))
            .with_delay(Endpoint::FeedListing, quota_delay(&limits.feed_listing))
    }

    /// Overrides the spacing of one endpoint
    pub fn with_delay(mut self, endpoint: Endpoint, delay: Duration) -> Self {
        self.slots.entry(endpoint).or_default().delay = delay;
        self
    }

    /// Returns the spacing enforced for an endpoint
    pub fn delay_for(&self, endpoint: Endpoint) -> Duration {
        self.slots
            .get(&endpoint)
            .map(|slot| slot.delay)
            .unwrap_or_default()
    }

    /// Waits until `endpoint` may be called again, then records the call
    pub async fn acquire(&mut self, endpoint: Endpoint) {
        let slot = self.slots.entry(endpoint).or_default();

        if let Some(wait) = slot.state.time_until_next_request(slot.delay, Instant::now()) {
            tracing::debug!("Rate gate: waiting {:?} before {}", wait, endpoint);
            tokio::time::sleep(wait).await;
        }

        slot.state.record_request(Instant::now());
    }

    /// Notes a throttle answer from `endpoint`
    pub fn record_throttle(&mut self, endpoint: Endpoint) {
        self.slots.entry(endpoint).or_default().state.record_throttle();
    }

    /// Number of requests released for `endpoint` so far
    pub fn request_count(&self, endpoint: Endpoint) -> u64 {
        self.slots
            .get(&endpoint)
            .map(|slot| slot.state.request_count)
            .unwrap_or(0)
    }

    /// Number of throttle answers recorded for `endpoint` so far
    pub fn throttle_count(&self, endpoint: Endpoint) -> u64 {
        self.slots
            .get(&endpoint)
            .map(|slot| slot.state.throttle_count)
            .unwrap_or(0)
    }
}
