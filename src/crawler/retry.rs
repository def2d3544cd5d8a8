//! Classification of remote failures and the post-throttle cooldown

use crate::config::RateLimitsConfig;
use crate::remote::RemoteError;
use std::future::Future;
use tokio::time::Duration;

/// Outcome of one remote call, as inspected by the crawl state machines
///
/// Unclassified failures never become an `Outcome`; they stay errors and
/// propagate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Ok(T),
    /// Retry the same unit of work after the cooldown
    Throttled,
    /// Permanent for this unit of work; the caller decides skip or abort
    Unauthorized(String),
    /// Permanent, skip
    NotFound(String),
}

impl<T> Outcome<T> {
    /// Sorts a remote result into an outcome, passing `Unknown` through
    pub fn classify(result: Result<T, RemoteError>) -> Result<Self, RemoteError> {
        match result {
            Ok(value) => Ok(Outcome::Ok(value)),
            Err(RemoteError::Throttled { .. }) => Ok(Outcome::Throttled),
            Err(RemoteError::Unauthorized(message)) => Ok(Outcome::Unauthorized(message)),
            Err(RemoteError::NotFound(message)) => Ok(Outcome::NotFound(message)),
            Err(err @ RemoteError::Unknown(_)) => Err(err),
        }
    }
}

/// Wraps remote calls and owns the throttle cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRetryPolicy {
    cooldown: Duration,
}

impl ThrottleRetryPolicy {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn from_config(limits: &RateLimitsConfig) -> Self {
        Self::new(Duration::from_secs(limits.throttle_cooldown_seconds))
    }

    /// Awaits a remote call and classifies its result
    pub async fn call<T, F>(&self, request: F) -> Result<Outcome<T>, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        Outcome::classify(request.await)
    }

    /// Logs a pause notice and sleeps for the cooldown
    pub async fn cool_down(&self, what: &str) {
        tracing::info!(
            "Throttled while {}; pausing for {}s",
            what,
            self.cooldown.as_secs()
        );
        tokio::time::sleep(self.cooldown).await;
    }
}

impl Default for ThrottleRetryPolicy {
    fn default() -> Self {
        Self::from_config(&RateLimitsConfig::default())
    }
}
