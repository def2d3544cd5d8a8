//! Crawler module - the resumable crawl state machines
//!
//! This module contains the core crawling logic, including:
//! - Per-endpoint request spacing (`RateGate`)
//! - Throttle classification and cooldown (`ThrottleRetryPolicy`)
//! - The follow-chain walk (`GraphWalker`)
//! - Exhaustive feed pagination (`PaginatedFetcher`)
//! - Feed backups over every stored account (`chain_backup`)

mod backup;
mod feed_fetcher;
mod graph_walker;
mod rate_gate;
mod retry;
mod selection;

pub use backup::{chain_backup, BackupReport};
pub use feed_fetcher::{FeedOutcome, FeedRun, PaginatedFetcher};
pub use graph_walker::{GraphWalker, StepOutcome, WalkReport, WalkStop};
pub use rate_gate::{delay, Endpoint, RateGate};
pub use retry::{Outcome, ThrottleRetryPolicy};
pub use selection::SelectionStrategy;
