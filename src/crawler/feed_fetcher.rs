//! Exhaustive feed pagination
//!
//! Two pagination schemes are supported:
//! - Cursor: request the page below the last bottom cursor until the cursors
//!   meet or a page comes back empty. Progress is `[items, top, bottom]`.
//! - Legacy: request items with ids at most `min(seen) - 1` until a page
//!   comes back empty. Progress is the flat item array.
//!
//! The items file is rewritten after every page, so an interrupted fetch
//! resumes past the last stored page instead of starting over.

use crate::config::{Config, FeedMode};
use crate::crawler::rate_gate::{Endpoint, RateGate};
use crate::crawler::retry::{Outcome, ThrottleRetryPolicy};
use crate::remote::{FeedApi, RemoteError};
use crate::state::{next_max_id, FeedProgress};
use crate::storage::FeedFile;
use crate::Result;
use serde_json::Value;
use std::path::Path;

/// How a feed fetch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The feed was paged to its end
    Complete,
    /// The feed is not accessible; whatever was stored before is kept
    Skipped { reason: String },
}

/// Result of one [`PaginatedFetcher::fetch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRun {
    pub handle: String,
    /// Items stored in the feed file, including earlier runs
    pub total_items: usize,
    /// Page requests issued by this run, throttled ones included
    pub pages_requested: u64,
    pub outcome: FeedOutcome,
}

impl FeedRun {
    fn skipped(handle: &str, total_items: usize, pages_requested: u64, reason: String) -> Self {
        Self {
            handle: handle.to_string(),
            total_items,
            pages_requested,
            outcome: FeedOutcome::Skipped { reason },
        }
    }

    fn complete(handle: &str, total_items: usize, pages_requested: u64) -> Self {
        Self {
            handle: handle.to_string(),
            total_items,
            pages_requested,
            outcome: FeedOutcome::Complete,
        }
    }
}

/// Pages through one account's feed against a feed capability
pub struct PaginatedFetcher<F> {
    api: F,
    gate: RateGate,
    policy: ThrottleRetryPolicy,
    page_size: u32,
    mode: FeedMode,
}

impl<F: FeedApi> PaginatedFetcher<F> {
    pub fn new(api: F, config: &Config) -> Self {
        Self {
            api,
            gate: RateGate::new(&config.rate_limits),
            policy: ThrottleRetryPolicy::from_config(&config.rate_limits),
            page_size: config.feed.page_size,
            mode: config.feed.mode,
        }
    }

    pub fn with_mode(mut self, mode: FeedMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn policy(&self) -> &ThrottleRetryPolicy {
        &self.policy
    }

    /// Fetches the whole feed of `handle` into the items file at `path`
    pub async fn fetch(&mut self, handle: &str, path: &Path) -> Result<FeedRun> {
        let file = FeedFile::new(path);
        let run = match self.mode {
            FeedMode::Cursor => self.fetch_cursor(handle, &file).await?,
            FeedMode::Legacy => self.fetch_legacy(handle, &file).await?,
        };

        match &run.outcome {
            FeedOutcome::Complete => tracing::info!(
                "Fetched feed of {}: {} items in {} page requests",
                handle,
                run.total_items,
                run.pages_requested
            ),
            FeedOutcome::Skipped { reason } => {
                tracing::info!("Skipped {} because {}", handle, reason)
            }
        }
        Ok(run)
    }

    /// Resolves `handle` to its id, retrying throttles
    ///
    /// The inner `Err` carries the reason the feed is inaccessible.
    async fn resolve(&mut self, handle: &str) -> Result<std::result::Result<u64, String>> {
        loop {
            self.gate.acquire(Endpoint::RecordLookup).await;
            match self.policy.call(self.api.lookup(handle)).await? {
                Outcome::Ok(id) => return Ok(Ok(id)),
                Outcome::Throttled => {
                    self.gate.record_throttle(Endpoint::RecordLookup);
                    self.policy
                        .cool_down(&format!("resolving {}", handle))
                        .await;
                }
                Outcome::Unauthorized(reason) | Outcome::NotFound(reason) => {
                    return Ok(Err(reason))
                }
            }
        }
    }

    async fn fetch_cursor(&mut self, handle: &str, file: &FeedFile) -> Result<FeedRun> {
        let mut progress = match file.load_cursor()? {
            Some(progress) if progress.bottom.is_none() || progress.is_exhausted() => {
                tracing::debug!("Feed of {} already complete", handle);
                return Ok(FeedRun::complete(handle, progress.items.len(), 0));
            }
            Some(progress) => {
                tracing::info!(
                    "Resuming feed of {} with {} stored items",
                    handle,
                    progress.items.len()
                );
                progress
            }
            None => FeedProgress::default(),
        };

        let user_id = match self.resolve(handle).await? {
            Ok(id) => id,
            Err(reason) => return Ok(FeedRun::skipped(handle, progress.items.len(), 0, reason)),
        };

        let mut pages = 0u64;
        loop {
            self.gate.acquire(Endpoint::FeedListing).await;
            pages += 1;

            let request = self
                .api
                .get_page(user_id, progress.bottom.as_deref(), self.page_size);
            match self.policy.call(request).await? {
                Outcome::Ok(page) => {
                    let last = page.is_last();
                    tracing::debug!(
                        "Feed page {} of {}: {} items",
                        pages,
                        handle,
                        page.items.len()
                    );
                    progress.append_page(page);
                    file.save_cursor(&progress)?;
                    if last {
                        break;
                    }
                }
                Outcome::Throttled => {
                    self.gate.record_throttle(Endpoint::FeedListing);
                    self.policy
                        .cool_down(&format!("paging the feed of {}", handle))
                        .await;
                }
                Outcome::Unauthorized(reason) | Outcome::NotFound(reason) => {
                    return Ok(FeedRun::skipped(
                        handle,
                        progress.items.len(),
                        pages,
                        reason,
                    ));
                }
            }
        }

        Ok(FeedRun::complete(handle, progress.items.len(), pages))
    }

    async fn fetch_legacy(&mut self, handle: &str, file: &FeedFile) -> Result<FeedRun> {
        let mut items: Vec<Value> = file.load_legacy()?.unwrap_or_default();
        if !items.is_empty() {
            tracing::info!("Resuming feed of {} with {} stored items", handle, items.len());
        }

        let user_id = match self.resolve(handle).await? {
            Ok(id) => id,
            Err(reason) => return Ok(FeedRun::skipped(handle, items.len(), 0, reason)),
        };

        let mut pages = 0u64;
        loop {
            let max_id = next_max_id(&items);
            if max_id.is_none() && !items.is_empty() {
                return Err(RemoteError::Unknown(format!(
                    "stored feed items of {} carry no ids",
                    handle
                ))
                .into());
            }

            self.gate.acquire(Endpoint::FeedListing).await;
            pages += 1;

            let request = self.api.get_legacy_page(user_id, max_id, self.page_size);
            match self.policy.call(request).await? {
                Outcome::Ok(page) if page.is_empty() => break,
                Outcome::Ok(page) => {
                    let page_max = next_max_id(&page).ok_or_else(|| {
                        RemoteError::Unknown(format!("feed page of {} carries no ids", handle))
                    })?;
                    if max_id.is_some_and(|previous| page_max >= previous) {
                        return Err(RemoteError::Unknown(format!(
                            "feed of {} did not advance past id {}",
                            handle,
                            page_max + 1
                        ))
                        .into());
                    }

                    tracing::debug!(
                        "Feed page {} of {}: {} items",
                        pages,
                        handle,
                        page.len()
                    );
                    items.extend(page);
                    file.save_legacy(&items)?;
                }
                Outcome::Throttled => {
                    self.gate.record_throttle(Endpoint::FeedListing);
                    self.policy
                        .cool_down(&format!("paging the feed of {}", handle))
                        .await;
                }
                Outcome::Unauthorized(reason) | Outcome::NotFound(reason) => {
                    return Ok(FeedRun::skipped(handle, items.len(), pages, reason));
                }
            }
        }

        Ok(FeedRun::complete(handle, items.len(), pages))
    }
}
