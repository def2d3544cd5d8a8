//! Integration tests for the follow-chain walk
//!
//! These tests run the walker against an in-memory follow graph with the
//! tokio clock paused, so rate-gate waits and throttle cooldowns complete
//! instantly while still being observable through the clock.

use async_trait::async_trait;
use chainwalk::config::{Config, UnauthorizedPolicy};
use chainwalk::crawler::{GraphWalker, SelectionStrategy, StepOutcome, WalkStop};
use chainwalk::remote::{AccountApi, GraphApi, NeighborPage, RemoteError};
use chainwalk::storage::{frontier_path, FrontierStore};
use chainwalk::{AccountRecord, CrawlError, TargetCount};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::time::{Duration, Instant};

/// In-memory follow graph with scripted failures
#[derive(Default)]
struct MockGraph {
    neighbors: HashMap<String, Vec<u64>>,
    records: HashMap<u64, AccountRecord>,
    unauthorized: HashSet<String>,
    missing: HashSet<String>,
    /// 1-based indices of lookup calls that answer with a throttle
    throttle_lookups: HashSet<usize>,
    lookup_batches: Mutex<Vec<usize>>,
    neighbor_calls: Mutex<Vec<String>>,
}

impl MockGraph {
    fn account(&mut self, id: u64, handle: &str, bio: &str) {
        let mut record = AccountRecord::new(id, handle);
        record.bio = bio.to_string();
        self.records.insert(id, record);
    }

    fn follows(&mut self, handle: &str, ids: &[u64]) {
        self.neighbors.insert(handle.to_string(), ids.to_vec());
    }

    fn lookup_batches(&self) -> Vec<usize> {
        self.lookup_batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountApi for MockGraph {
    async fn lookup(&self, handle: &str) -> Result<u64, RemoteError> {
        self.records
            .values()
            .find(|r| r.handle == handle)
            .map(|r| r.id)
            .ok_or_else(|| RemoteError::NotFound(handle.to_string()))
    }
}

#[async_trait]
impl GraphApi for MockGraph {
    async fn get_neighbors(
        &self,
        handle: &str,
        cursor: Option<i64>,
        count: u32,
    ) -> Result<NeighborPage, RemoteError> {
        self.neighbor_calls.lock().unwrap().push(handle.to_string());
        if self.unauthorized.contains(handle) {
            return Err(RemoteError::Unauthorized(format!("{} is protected", handle)));
        }
        if self.missing.contains(handle) {
            return Err(RemoteError::NotFound(format!("{} does not exist", handle)));
        }

        let all = self.neighbors.get(handle).cloned().unwrap_or_default();
        let start = cursor.unwrap_or(0) as usize;
        let end = (start + count as usize).min(all.len());
        Ok(NeighborPage {
            ids: all[start..end].to_vec(),
            next_cursor: (end < all.len()).then_some(end as i64),
        })
    }

    async fn get_records(&self, ids: &[u64]) -> Result<Vec<AccountRecord>, RemoteError> {
        let call = {
            let mut batches = self.lookup_batches.lock().unwrap();
            batches.push(ids.len());
            batches.len()
        };
        if self.throttle_lookups.contains(&call) {
            return Err(RemoteError::Throttled {
                endpoint: "users/lookup".to_string(),
            });
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect())
    }
}

fn test_config(dir: &Path) -> Config {
    let mut config = Config::with_api("https://api.example.com/1.1/", "token");
    config.graph.data_dir = dir.display().to_string();
    config.graph.keywords = vec!["rust".to_string()];
    config
}

/// alice follows 250 accounts; every fifth one writes rust
fn wide_graph() -> MockGraph {
    let mut graph = MockGraph::default();
    graph.account(1, "alice", "rust");
    let ids: Vec<u64> = (1000..1250).collect();
    for id in &ids {
        let bio = if id % 5 == 0 { "rust dev" } else { "gardener" };
        graph.account(*id, &format!("user{}", id), bio);
    }
    graph.follows("alice", &ids);
    graph
}

/// A small graph with a cycle back to the seed
fn small_graph() -> MockGraph {
    let mut graph = MockGraph::default();
    graph.account(1, "alice", "writes go");
    graph.account(2, "bob", "rust person");
    graph.account(3, "carol", "rustacean");
    graph.account(4, "dave", "knitting");
    graph.account(5, "erin", "rust and tea");
    graph.account(6, "frank", "Rust!");
    graph.follows("alice", &[2, 3, 4]);
    graph.follows("bob", &[3, 5]);
    graph.follows("carol", &[1, 6]);
    graph.follows("erin", &[]);
    graph.follows("frank", &[2]);
    graph
}

fn assert_checkpoint_invariant(path: &Path) {
    let state = FrontierStore::new(path).load().unwrap().unwrap();
    assert!(
        state.done_set.is_disjoint(&state.current_set),
        "done and current overlap: {:?}",
        state
    );
}

#[tokio::test(start_paused = true)]
async fn test_lookups_batched_by_hundred() {
    let dir = TempDir::new().unwrap();
    let graph = Arc::new(wide_graph());
    let mut walker = GraphWalker::new(graph.clone(), &test_config(dir.path())).unwrap();

    let mut state = walker.start("alice", TargetCount::Infinite).unwrap();
    let outcome = walker.step(&mut state).await.unwrap();

    assert!(matches!(
        outcome,
        StepOutcome::Expanded {
            neighbors: 250,
            new_records: 250,
            queued: 50,
            ..
        }
    ));
    assert_eq!(graph.lookup_batches(), vec![100, 100, 50]);
    assert_eq!(walker.downloaded().len(), 250);
    assert!(state.done_set.contains("alice"));
    assert_eq!(state.current_set.len(), 50);
    assert!(state.current_set.contains("user1000"));
    assert!(!state.current_set.contains("user1001"));

    // Every record is stored under its id and its handle
    assert!(dir.path().join("by-id/1249.json").is_file());
    assert!(dir.path().join("by-handle/user1249.json").is_file());
}

#[tokio::test(start_paused = true)]
async fn test_oversized_lookup_batch_is_capped() {
    let dir = TempDir::new().unwrap();
    let graph = Arc::new(wide_graph());
    let mut config = test_config(dir.path());
    config.graph.lookup_batch_size = 500;
    let mut walker = GraphWalker::new(graph.clone(), &config).unwrap();

    let mut state = walker.start("alice", TargetCount::Infinite).unwrap();
    walker.step(&mut state).await.unwrap();

    assert_eq!(graph.lookup_batches(), vec![100, 100, 50]);
    assert_eq!(walker.downloaded().len(), 250);
}

#[tokio::test(start_paused = true)]
async fn test_zero_lookup_batch_looks_up_one_at_a_time() {
    let dir = TempDir::new().unwrap();
    let graph = Arc::new(small_graph());
    let mut config = test_config(dir.path());
    config.graph.lookup_batch_size = 0;
    let mut walker = GraphWalker::new(graph.clone(), &config).unwrap();

    let mut state = walker.start("alice", TargetCount::Infinite).unwrap();
    let outcome = walker.step(&mut state).await.unwrap();

    assert!(matches!(outcome, StepOutcome::Expanded { new_records: 3, .. }));
    assert_eq!(graph.lookup_batches(), vec![1, 1, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_walk_report_counts_requests_and_throttles() {
    let dir = TempDir::new().unwrap();
    let mut graph = wide_graph();
    graph.throttle_lookups.insert(2);
    let mut walker = GraphWalker::new(Arc::new(graph), &test_config(dir.path())).unwrap();

    let state = walker.start("alice", TargetCount::Finite(250)).unwrap();
    let report = walker.run(state).await.unwrap();

    assert_eq!(report.stop, WalkStop::TargetReached);
    assert_eq!(report.steps, 2);
    // Two neighbor listings, two lookups before the throttle, two after
    assert_eq!(report.requests, 6);
    assert_eq!(report.throttles, 1);
}

#[tokio::test(start_paused = true)]
async fn test_throttle_requeues_handle_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut graph = wide_graph();
    graph.throttle_lookups.insert(2);
    let graph = Arc::new(graph);
    let config = test_config(dir.path());
    let mut walker = GraphWalker::new(graph.clone(), &config).unwrap();

    let mut state = walker.start("alice", TargetCount::Infinite).unwrap();
    let before = Instant::now();
    let outcome = walker.step(&mut state).await.unwrap();

    assert_eq!(
        outcome,
        StepOutcome::Throttled {
            handle: "alice".to_string()
        }
    );
    assert!(before.elapsed() >= Duration::from_secs(config.rate_limits.throttle_cooldown_seconds));
    assert!(state.current_set.contains("alice"));
    assert!(!state.done_set.contains("alice"));
    assert!(state.next_set.is_empty());
    assert_eq!(walker.downloaded().len(), 100);

    // The persisted state matches the in-memory one
    let saved = FrontierStore::new(frontier_path(dir.path()))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(saved, state);

    // The next pass only looks up what is still missing
    let outcome = walker.step(&mut state).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Expanded { new_records: 150, .. }));
    assert_eq!(graph.lookup_batches(), vec![100, 100, 100, 50]);
    assert!(state.done_set.contains("alice"));
    assert_eq!(walker.downloaded().len(), 250);
}

#[tokio::test(start_paused = true)]
async fn test_walk_until_frontier_exhausted() {
    let dir = TempDir::new().unwrap();
    let graph = Arc::new(small_graph());
    let mut walker = GraphWalker::new(graph.clone(), &test_config(dir.path())).unwrap();

    let state = walker.start("alice", TargetCount::Infinite).unwrap();
    let report = walker.run(state).await.unwrap();

    assert_eq!(report.stop, WalkStop::FrontierExhausted);
    assert_eq!(report.steps, 5);
    assert_eq!(report.downloaded, 6);
    assert_eq!(report.requests, 8);
    assert_eq!(report.throttles, 0);
    assert_eq!(
        report.state.done_set,
        BTreeSet::from(
            ["alice", "bob", "carol", "erin", "frank"].map(String::from)
        )
    );
    assert!(!report.state.done_set.contains("dave"));
    assert!(report.state.current_set.is_empty());
    assert!(report.state.next_set.is_empty());

    // Each handle was expanded exactly once, in level order
    assert_eq!(
        *graph.neighbor_calls.lock().unwrap(),
        vec!["alice", "bob", "carol", "erin", "frank"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_invariant_holds_at_every_checkpoint() {
    let dir = TempDir::new().unwrap();
    let graph = Arc::new(small_graph());
    let mut walker = GraphWalker::new(graph, &test_config(dir.path())).unwrap();
    let path = frontier_path(dir.path());

    let mut state = walker.start("alice", TargetCount::Infinite).unwrap();
    assert_checkpoint_invariant(&path);

    while !state.is_exhausted() {
        walker.step(&mut state).await.unwrap();
        assert_checkpoint_invariant(&path);
    }
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_walk_resumes_to_same_result() {
    let uninterrupted_dir = TempDir::new().unwrap();
    let mut walker =
        GraphWalker::new(Arc::new(small_graph()), &test_config(uninterrupted_dir.path())).unwrap();
    let state = walker.start("alice", TargetCount::Infinite).unwrap();
    let expected = walker.run(state).await.unwrap();
    let expected_downloaded = walker.downloaded().clone();

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    {
        let mut walker = GraphWalker::new(Arc::new(small_graph()), &config).unwrap();
        let mut state = walker.start("alice", TargetCount::Infinite).unwrap();
        walker.step(&mut state).await.unwrap();
        walker.step(&mut state).await.unwrap();
        // Killed here: only the files on disk survive
    }

    let mut walker = GraphWalker::new(Arc::new(small_graph()), &config).unwrap();
    assert_eq!(walker.downloaded().len(), 4);
    let state = walker.resume().unwrap();
    assert_eq!(state.done_set.len(), 2);
    let resumed = walker.run(state).await.unwrap();

    assert_eq!(resumed.stop, expected.stop);
    assert_eq!(resumed.state.done_set, expected.state.done_set);
    assert_eq!(walker.downloaded(), &expected_downloaded);
}

#[tokio::test(start_paused = true)]
async fn test_sampled_walk_resumes_to_same_result() {
    let mut graph = wide_graph();
    for id in 1000..1250u64 {
        graph.follows(&format!("user{}", id), &[1]);
    }
    let selection = SelectionStrategy::WeightedSample { k: 4, seed: 42 };

    let uninterrupted_dir = TempDir::new().unwrap();
    let graph = Arc::new(graph);
    let mut walker = GraphWalker::new(graph.clone(), &test_config(uninterrupted_dir.path()))
        .unwrap()
        .with_selection(selection);
    let state = walker.start("alice", TargetCount::Infinite).unwrap();
    let expected = walker.run(state).await.unwrap();
    assert_eq!(expected.state.done_set.len(), 5);

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    {
        let mut walker = GraphWalker::new(graph.clone(), &config)
            .unwrap()
            .with_selection(selection);
        let mut state = walker.start("alice", TargetCount::Infinite).unwrap();
        walker.step(&mut state).await.unwrap();
        walker.step(&mut state).await.unwrap();
    }

    let mut walker = GraphWalker::new(graph, &config)
        .unwrap()
        .with_selection(selection);
    let state = walker.resume().unwrap();
    let resumed = walker.run(state).await.unwrap();
    assert_eq!(resumed.state.done_set, expected.state.done_set);
}

#[tokio::test(start_paused = true)]
async fn test_stops_when_target_reached() {
    let dir = TempDir::new().unwrap();
    let mut walker =
        GraphWalker::new(Arc::new(small_graph()), &test_config(dir.path())).unwrap();

    let state = walker.start("alice", TargetCount::Finite(3)).unwrap();
    let report = walker.run(state).await.unwrap();

    assert_eq!(report.stop, WalkStop::TargetReached);
    assert_eq!(report.steps, 1);
    assert_eq!(report.downloaded, 3);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_handle_skipped_without_done() {
    let dir = TempDir::new().unwrap();
    let mut graph = small_graph();
    graph.unauthorized.insert("bob".to_string());
    let mut walker = GraphWalker::new(Arc::new(graph), &test_config(dir.path())).unwrap();

    let mut state = walker.start("alice", TargetCount::Infinite).unwrap();
    walker.step(&mut state).await.unwrap();

    let outcome = walker.step(&mut state).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Skipped { ref handle, .. } if handle == "bob"));
    assert!(!state.done_set.contains("bob"));
    assert!(!state.current_set.contains("bob"));
    assert!(state.current_set.contains("carol"));
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_aborts_when_configured() {
    let dir = TempDir::new().unwrap();
    let mut graph = small_graph();
    graph.unauthorized.insert("bob".to_string());
    let mut config = test_config(dir.path());
    config.graph.on_unauthorized = UnauthorizedPolicy::Abort;
    let mut walker = GraphWalker::new(Arc::new(graph), &config).unwrap();

    let state = walker.start("alice", TargetCount::Infinite).unwrap();
    let result = walker.run(state).await;
    assert!(matches!(
        result,
        Err(CrawlError::Unauthorized { ref handle, .. }) if handle == "bob"
    ));

    // bob stays queued for the next run
    let saved = walker.resume().unwrap();
    assert!(saved.current_set.contains("bob"));
    assert!(!saved.done_set.contains("bob"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_handle_marked_done() {
    let dir = TempDir::new().unwrap();
    let mut graph = small_graph();
    graph.missing.insert("alice".to_string());
    let mut walker = GraphWalker::new(Arc::new(graph), &test_config(dir.path())).unwrap();

    let state = walker.start("alice", TargetCount::Infinite).unwrap();
    let report = walker.run(state).await.unwrap();

    assert_eq!(report.stop, WalkStop::FrontierExhausted);
    assert!(report.state.done_set.contains("alice"));
    assert_eq!(report.downloaded, 0);
}

#[tokio::test(start_paused = true)]
async fn test_neighbor_pages_capped() {
    let dir = TempDir::new().unwrap();
    let graph = Arc::new(wide_graph());
    let mut config = test_config(dir.path());
    config.graph.neighbor_page_size = 20;
    config.graph.max_neighbor_pages = 3;
    let mut walker = GraphWalker::new(graph.clone(), &config).unwrap();

    let mut state = walker.start("alice", TargetCount::Infinite).unwrap();
    let outcome = walker.step(&mut state).await.unwrap();

    assert!(matches!(outcome, StepOutcome::Expanded { neighbors: 60, .. }));
    assert_eq!(graph.neighbor_calls.lock().unwrap().len(), 3);
    assert_eq!(graph.lookup_batches(), vec![60]);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_failure_propagates() {
    struct Broken;

    #[async_trait]
    impl AccountApi for Broken {
        async fn lookup(&self, _handle: &str) -> Result<u64, RemoteError> {
            Ok(1)
        }
    }

    #[async_trait]
    impl GraphApi for Broken {
        async fn get_neighbors(
            &self,
            _handle: &str,
            _cursor: Option<i64>,
            _count: u32,
        ) -> Result<NeighborPage, RemoteError> {
            Err(RemoteError::Unknown("HTTP 500".to_string()))
        }

        async fn get_records(&self, _ids: &[u64]) -> Result<Vec<AccountRecord>, RemoteError> {
            Ok(vec![])
        }
    }

    let dir = TempDir::new().unwrap();
    let mut walker = GraphWalker::new(Broken, &test_config(dir.path())).unwrap();
    let state = walker.start("alice", TargetCount::Infinite).unwrap();

    let result = walker.run(state).await;
    assert!(matches!(result, Err(CrawlError::Remote(RemoteError::Unknown(_)))));
}

#[test]
fn test_resume_without_saved_state() {
    let dir = TempDir::new().unwrap();
    let walker = GraphWalker::new(Arc::new(small_graph()), &test_config(dir.path())).unwrap();
    assert!(matches!(
        walker.resume(),
        Err(CrawlError::NoSavedState { .. })
    ));
}

#[test]
fn test_corrupt_state_rejected() {
    let dir = TempDir::new().unwrap();
    let path = frontier_path(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{"done_set": ["alice"], "current_set": ["alice"], "next_set": [], "n": 10}"#,
    )
    .unwrap();

    let walker = GraphWalker::new(Arc::new(small_graph()), &test_config(dir.path())).unwrap();
    let err = walker.resume().unwrap_err();
    assert!(err.is_corrupt_state());
}
