//! Follow-chain walk - the level-by-level graph traversal
//!
//! Each step expands exactly one handle:
//! 1. Pop the handle from the current level
//! 2. List its neighbor ids (paged, bounded)
//! 3. Download the records not fetched before, in batches
//! 4. Filter every neighbor record and select the next-level candidates
//! 5. Mark the handle done, advance the level if it drained
//! 6. Persist the frontier
//!
//! The frontier is saved after every step, so the process may be killed at
//! any point and resumed from the last completed expansion.

use crate::config::{Config, UnauthorizedPolicy, MAX_LOOKUP_BATCH};
use crate::crawler::rate_gate::{Endpoint, RateGate};
use crate::crawler::retry::{Outcome, ThrottleRetryPolicy};
use crate::crawler::selection::SelectionStrategy;
use crate::filter::FilterPredicate;
use crate::remote::GraphApi;
use crate::state::{AccountRecord, FrontierState, TargetCount};
use crate::storage::{frontier_path, FrontierStore, RecordStore};
use crate::{CrawlError, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

/// What one call to [`GraphWalker::step`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The handle was expanded and marked done
    Expanded {
        handle: String,
        neighbors: usize,
        new_records: usize,
        queued: usize,
    },
    /// The remote throttled us; the handle is back in the current level
    Throttled { handle: String },
    /// The handle's neighbor list is not accessible; dropped for this pass
    Skipped { handle: String, reason: String },
    /// The handle no longer exists; marked done
    Missing { handle: String },
    /// Nothing is queued
    Idle,
}

/// Why a walk stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStop {
    TargetReached,
    FrontierExhausted,
}

/// Summary of a finished walk
#[derive(Debug, Clone)]
pub struct WalkReport {
    pub stop: WalkStop,
    pub steps: u64,
    pub downloaded: usize,
    /// Requests released to the graph and lookup endpoints
    pub requests: u64,
    /// Throttle answers received from the graph and lookup endpoints
    pub throttles: u64,
    pub state: FrontierState,
}

struct Expansion {
    neighbors: usize,
    new_records: usize,
    candidates: Vec<String>,
}

/// Drives the follow-chain walk against a graph capability
pub struct GraphWalker<G> {
    api: G,
    records: RecordStore,
    frontier: FrontierStore,
    gate: RateGate,
    policy: ThrottleRetryPolicy,
    filter: FilterPredicate,
    selection: SelectionStrategy,
    downloaded: HashSet<u64>,
    neighbor_page_size: u32,
    max_neighbor_pages: u32,
    lookup_batch_size: usize,
    on_unauthorized: UnauthorizedPolicy,
}

impl<G: GraphApi> GraphWalker<G> {
    /// Creates a walker over the configured data directory
    ///
    /// The set of downloaded ids is rebuilt from the records on disk. The
    /// lookup batch size is clamped to `1..=MAX_LOOKUP_BATCH`.
    pub fn new(api: G, config: &Config) -> Result<Self> {
        let data_dir = Path::new(&config.graph.data_dir);
        let records = RecordStore::new(data_dir);
        let downloaded = records.downloaded_ids()?;
        tracing::debug!(
            "Found {} downloaded records under {}",
            downloaded.len(),
            data_dir.display()
        );

        Ok(Self {
            api,
            records,
            frontier: FrontierStore::new(frontier_path(data_dir)),
            gate: RateGate::new(&config.rate_limits),
            policy: ThrottleRetryPolicy::from_config(&config.rate_limits),
            filter: FilterPredicate::new(&config.graph.keywords),
            selection: SelectionStrategy::from(&config.graph.selection),
            downloaded,
            neighbor_page_size: config.graph.neighbor_page_size,
            max_neighbor_pages: config.graph.max_neighbor_pages,
            lookup_batch_size: config.graph.lookup_batch_size.clamp(1, MAX_LOOKUP_BATCH),
            on_unauthorized: config.graph.on_unauthorized,
        })
    }

    pub fn with_selection(mut self, selection: SelectionStrategy) -> Self {
        self.selection = selection;
        self
    }

    pub fn downloaded(&self) -> &HashSet<u64> {
        &self.downloaded
    }

    pub fn frontier_store(&self) -> &FrontierStore {
        &self.frontier
    }

    /// Creates and persists the state of a fresh walk from `seed`
    pub fn start(&self, seed: &str, n: TargetCount) -> Result<FrontierState> {
        let state = FrontierState::seeded(seed, n);
        self.frontier.save(&state)?;
        tracing::info!("Starting walk from {} (target: {})", seed, n);
        Ok(state)
    }

    /// Loads the persisted state of an interrupted walk
    pub fn resume(&self) -> Result<FrontierState> {
        let state = self
            .frontier
            .load()?
            .ok_or_else(|| CrawlError::NoSavedState {
                path: self.frontier.path().display().to_string(),
            })?;
        tracing::info!(
            "Resuming walk: {} done, {} current, {} next, {} downloaded",
            state.done_set.len(),
            state.current_set.len(),
            state.next_set.len(),
            self.downloaded.len()
        );
        Ok(state)
    }

    /// Expands one handle and persists the resulting state
    pub async fn step(&mut self, state: &mut FrontierState) -> Result<StepOutcome> {
        state.advance_if_drained();
        let Some(handle) = state.pop_current() else {
            return Ok(StepOutcome::Idle);
        };

        let expansion = self.expand(&handle, &state.done_set).await?;
        let outcome = match expansion {
            Outcome::Ok(expansion) => {
                let queued = state.enqueue_next(expansion.candidates);
                state.mark_done(handle.clone());
                StepOutcome::Expanded {
                    handle,
                    neighbors: expansion.neighbors,
                    new_records: expansion.new_records,
                    queued,
                }
            }
            Outcome::Throttled => {
                state.requeue(handle.clone());
                self.frontier.save(state)?;
                self.policy
                    .cool_down(&format!("expanding {}", handle))
                    .await;
                return Ok(StepOutcome::Throttled { handle });
            }
            Outcome::Unauthorized(reason) => match self.on_unauthorized {
                UnauthorizedPolicy::Skip => {
                    tracing::info!("Skipped {} because {}", handle, reason);
                    StepOutcome::Skipped { handle, reason }
                }
                UnauthorizedPolicy::Abort => {
                    state.requeue(handle.clone());
                    self.frontier.save(state)?;
                    tracing::error!("Aborting: unauthorized while expanding {}", handle);
                    return Err(CrawlError::Unauthorized {
                        handle,
                        message: reason,
                    });
                }
            },
            Outcome::NotFound(reason) => {
                tracing::info!("Skipped {} because {}", handle, reason);
                state.mark_done(handle.clone());
                StepOutcome::Missing { handle }
            }
        };

        if state.advance_if_drained() {
            tracing::info!(
                "Advancing to next level: {} handles queued",
                state.current_set.len()
            );
        }
        self.frontier.save(state)?;
        Ok(outcome)
    }

    /// Steps until the target is reached or nothing is left to expand
    pub async fn run(&mut self, mut state: FrontierState) -> Result<WalkReport> {
        let mut steps = 0u64;

        let stop = loop {
            if state.n.is_reached(self.downloaded.len()) {
                break WalkStop::TargetReached;
            }
            if state.is_exhausted() {
                break WalkStop::FrontierExhausted;
            }

            let outcome = self.step(&mut state).await?;
            steps += 1;

            if let StepOutcome::Expanded {
                handle,
                neighbors,
                new_records,
                queued,
            } = &outcome
            {
                tracing::info!(
                    "Expanded {}: {} neighbors, {} new records, {} queued ({} downloaded, {} done, {} current, {} next)",
                    handle,
                    neighbors,
                    new_records,
                    queued,
                    self.downloaded.len(),
                    state.done_set.len(),
                    state.current_set.len(),
                    state.next_set.len()
                );
            }
        };

        match stop {
            WalkStop::TargetReached => tracing::info!(
                "Target of {} reached with {} records downloaded",
                state.n,
                self.downloaded.len()
            ),
            WalkStop::FrontierExhausted => tracing::info!(
                "Frontier exhausted with {} records downloaded",
                self.downloaded.len()
            ),
        }

        Ok(WalkReport {
            stop,
            steps,
            downloaded: self.downloaded.len(),
            requests: self.gate.request_count(Endpoint::GraphNeighbors)
                + self.gate.request_count(Endpoint::RecordLookup),
            throttles: self.gate.throttle_count(Endpoint::GraphNeighbors)
                + self.gate.throttle_count(Endpoint::RecordLookup),
            state,
        })
    }

    async fn expand(
        &mut self,
        handle: &str,
        done: &BTreeSet<String>,
    ) -> Result<Outcome<Expansion>> {
        let ids = match self.list_neighbors(handle).await? {
            Outcome::Ok(ids) => ids,
            Outcome::Throttled => return Ok(Outcome::Throttled),
            Outcome::Unauthorized(reason) => return Ok(Outcome::Unauthorized(reason)),
            Outcome::NotFound(reason) => return Ok(Outcome::NotFound(reason)),
        };

        let new_ids: Vec<u64> = ids
            .iter()
            .copied()
            .filter(|id| !self.downloaded.contains(id))
            .collect();

        let mut fetched: HashMap<u64, AccountRecord> = HashMap::new();
        for batch in new_ids.chunks(self.lookup_batch_size) {
            self.gate.acquire(Endpoint::RecordLookup).await;
            match self.policy.call(self.api.get_records(batch)).await? {
                Outcome::Ok(records) => {
                    tracing::debug!(
                        "Looked up {} ids for {}, got {} records",
                        batch.len(),
                        handle,
                        records.len()
                    );
                    for record in records {
                        self.records.save(&record)?;
                        self.downloaded.insert(record.id);
                        fetched.insert(record.id, record);
                    }
                }
                Outcome::Throttled => {
                    self.gate.record_throttle(Endpoint::RecordLookup);
                    return Ok(Outcome::Throttled);
                }
                Outcome::Unauthorized(reason) => return Ok(Outcome::Unauthorized(reason)),
                Outcome::NotFound(_) => {
                    tracing::debug!("None of a batch of {} ids exist", batch.len());
                }
            }
        }

        let mut stored = Vec::new();
        for id in &ids {
            if fetched.contains_key(id) {
                continue;
            }
            match self.records.load(*id)? {
                Some(record) => stored.push(record),
                None => tracing::warn!("Neighbor {} of {} has no stored record", id, handle),
            }
        }

        let candidates: Vec<&AccountRecord> = fetched
            .values()
            .chain(stored.iter())
            .filter(|record| record.handle != handle)
            .filter(|record| !record.protected)
            .filter(|record| !done.contains(&record.handle))
            .filter(|record| self.filter.matches(record))
            .collect();

        Ok(Outcome::Ok(Expansion {
            neighbors: ids.len(),
            new_records: fetched.len(),
            candidates: self.selection.select(handle, &candidates),
        }))
    }

    /// Lists up to `max_neighbor_pages` pages of `handle`'s neighbor ids
    async fn list_neighbors(&mut self, handle: &str) -> Result<Outcome<Vec<u64>>> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = None;

        for page in 0..self.max_neighbor_pages {
            self.gate.acquire(Endpoint::GraphNeighbors).await;
            let result = self
                .policy
                .call(
                    self.api
                        .get_neighbors(handle, cursor, self.neighbor_page_size),
                )
                .await?;

            match result {
                Outcome::Ok(neighbors) => {
                    ids.extend(neighbors.ids.into_iter().filter(|id| seen.insert(*id)));
                    match neighbors.next_cursor {
                        Some(next) => cursor = Some(next),
                        None => return Ok(Outcome::Ok(ids)),
                    }
                }
                Outcome::Throttled => {
                    self.gate.record_throttle(Endpoint::GraphNeighbors);
                    return Ok(Outcome::Throttled);
                }
                Outcome::Unauthorized(reason) => return Ok(Outcome::Unauthorized(reason)),
                Outcome::NotFound(reason) => return Ok(Outcome::NotFound(reason)),
            }
            tracing::debug!("Neighbor page {} of {} listed", page + 1, handle);
        }

        tracing::debug!(
            "Stopped listing neighbors of {} after {} pages",
            handle,
            self.max_neighbor_pages
        );
        Ok(Outcome::Ok(ids))
    }
}
