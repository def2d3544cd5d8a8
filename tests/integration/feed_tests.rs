//! Integration tests for feed pagination and chain backup
//!
//! The feed is served by an in-memory capability; the tokio clock is paused
//! so rate-gate waits and cooldowns complete instantly.

use async_trait::async_trait;
use chainwalk::config::{Config, FeedMode};
use chainwalk::crawler::{chain_backup, FeedOutcome, PaginatedFetcher};
use chainwalk::remote::{AccountApi, FeedApi, RemoteError};
use chainwalk::state::{item_id, FeedPage};
use chainwalk::storage::{feed_path, FeedFile, RecordStore};
use chainwalk::{AccountRecord, CrawlError, FeedProgress, FilterPredicate};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::time::{Duration, Instant};

/// A feed of `len` items with ids `len..=1`, newest first
///
/// Cursor pages are addressed as `c<offset>`; the last page answers with
/// `bottom == top`.
#[derive(Default)]
struct MockFeed {
    items: Vec<Value>,
    users: HashMap<String, u64>,
    /// 1-based page calls answered with a throttle
    throttle_calls: HashSet<usize>,
    /// 1-based page calls answered with an unclassified failure
    fail_calls: HashSet<usize>,
    /// Legacy pages ignore max_id
    stuck: bool,
    calls: Mutex<usize>,
    cursors: Mutex<Vec<Option<String>>>,
}

impl MockFeed {
    fn with_items(len: u64) -> Self {
        Self {
            items: (1..=len).rev().map(|id| json!({"id": id, "text": format!("post {}", id)})).collect(),
            users: HashMap::from([("alice".to_string(), 7)]),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn next_call(&self) -> Result<(), RemoteError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if self.throttle_calls.contains(&call) {
            return Err(RemoteError::Throttled {
                endpoint: "timeline".to_string(),
            });
        }
        if self.fail_calls.contains(&call) {
            return Err(RemoteError::Unknown("HTTP 500".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountApi for MockFeed {
    async fn lookup(&self, handle: &str) -> Result<u64, RemoteError> {
        match handle {
            "locked" => Err(RemoteError::Unauthorized("locked is protected".to_string())),
            _ => self
                .users
                .get(handle)
                .copied()
                .ok_or_else(|| RemoteError::NotFound(format!("{} does not exist", handle))),
        }
    }
}

#[async_trait]
impl FeedApi for MockFeed {
    async fn get_page(
        &self,
        _user_id: u64,
        cursor: Option<&str>,
        count: u32,
    ) -> Result<FeedPage, RemoteError> {
        self.cursors
            .lock()
            .unwrap()
            .push(cursor.map(str::to_string));
        self.next_call()?;

        let start: usize = cursor
            .and_then(|c| c.strip_prefix('c'))
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let end = (start + count as usize).min(self.items.len());
        let top = format!("c{}", start);
        let bottom = if end < self.items.len() {
            format!("c{}", end)
        } else {
            top.clone()
        };

        Ok(FeedPage {
            items: self.items[start..end].to_vec(),
            top: Some(top),
            bottom: Some(bottom),
        })
    }

    async fn get_legacy_page(
        &self,
        _user_id: u64,
        max_id: Option<u64>,
        count: u32,
    ) -> Result<Vec<Value>, RemoteError> {
        self.next_call()?;
        let max_id = if self.stuck { None } else { max_id };
        Ok(self
            .items
            .iter()
            .filter(|item| max_id.map_or(true, |max| item_id(item).unwrap_or(0) <= max))
            .take(count as usize)
            .cloned()
            .collect())
    }
}

fn test_config(mode: FeedMode) -> Config {
    let mut config = Config::with_api("https://api.example.com/1.1/", "token");
    config.feed.page_size = 200;
    config.feed.mode = mode;
    config
}

fn stored_ids(items: &[Value]) -> Vec<u64> {
    items.iter().filter_map(item_id).collect()
}

fn assert_no_duplicates(items: &[Value]) {
    let ids = stored_ids(items);
    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len(), "duplicate items stored");
}

#[tokio::test(start_paused = true)]
async fn test_cursor_feed_in_three_pages() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "alice");
    let feed = Arc::new(MockFeed::with_items(450));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &test_config(FeedMode::Cursor));

    let run = fetcher.fetch("alice", &path).await.unwrap();

    assert_eq!(run.outcome, FeedOutcome::Complete);
    assert_eq!(run.pages_requested, 3);
    assert_eq!(run.total_items, 450);
    assert_eq!(feed.calls(), 3);

    let progress = FeedFile::new(&path).load_cursor().unwrap().unwrap();
    assert_eq!(progress.items.len(), 450);
    assert_no_duplicates(&progress.items);
    assert!(progress.is_exhausted());
}

#[tokio::test(start_paused = true)]
async fn test_cursor_feed_exact_multiple_of_page_size() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "alice");
    let feed = Arc::new(MockFeed::with_items(400));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &test_config(FeedMode::Cursor));

    let run = fetcher.fetch("alice", &path).await.unwrap();
    assert_eq!(run.pages_requested, 2);
    assert_eq!(run.total_items, 400);
}

#[tokio::test(start_paused = true)]
async fn test_cursor_feed_resumes_past_last_page() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "alice");

    let mut failing = MockFeed::with_items(450);
    failing.fail_calls.insert(2);
    let mut fetcher = PaginatedFetcher::new(failing, &test_config(FeedMode::Cursor));
    let result = fetcher.fetch("alice", &path).await;
    assert!(matches!(result, Err(CrawlError::Remote(RemoteError::Unknown(_)))));

    let partial = FeedFile::new(&path).load_cursor().unwrap().unwrap();
    assert_eq!(partial.items.len(), 200);
    assert_eq!(partial.bottom.as_deref(), Some("c200"));

    let feed = Arc::new(MockFeed::with_items(450));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &test_config(FeedMode::Cursor));
    let run = fetcher.fetch("alice", &path).await.unwrap();

    assert_eq!(run.pages_requested, 2);
    assert_eq!(run.total_items, 450);
    assert_eq!(
        feed.cursors.lock().unwrap().first().cloned().flatten().as_deref(),
        Some("c200")
    );
    let progress = FeedFile::new(&path).load_cursor().unwrap().unwrap();
    assert_no_duplicates(&progress.items);
}

#[tokio::test(start_paused = true)]
async fn test_complete_feed_is_not_refetched() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "alice");
    let feed = Arc::new(MockFeed::with_items(50));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &test_config(FeedMode::Cursor));

    fetcher.fetch("alice", &path).await.unwrap();
    let again = fetcher.fetch("alice", &path).await.unwrap();

    assert_eq!(again.outcome, FeedOutcome::Complete);
    assert_eq!(again.pages_requested, 0);
    assert_eq!(again.total_items, 50);
    assert_eq!(feed.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_page_is_requested_again() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "alice");
    let mut feed = MockFeed::with_items(450);
    feed.throttle_calls.insert(2);
    let feed = Arc::new(feed);
    let config = test_config(FeedMode::Cursor);
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &config);

    let start = Instant::now();
    let run = fetcher.fetch("alice", &path).await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(config.rate_limits.throttle_cooldown_seconds));
    assert_eq!(run.pages_requested, 4);
    assert_eq!(run.total_items, 450);
    assert_eq!(
        *feed.cursors.lock().unwrap(),
        vec![
            None,
            Some("c200".to_string()),
            Some("c200".to_string()),
            Some("c400".to_string())
        ]
    );

    let progress = FeedFile::new(&path).load_cursor().unwrap().unwrap();
    assert_no_duplicates(&progress.items);
}

#[tokio::test(start_paused = true)]
async fn test_legacy_feed_ends_on_empty_page() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "alice");
    let feed = Arc::new(MockFeed::with_items(450));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &test_config(FeedMode::Legacy));

    let run = fetcher.fetch("alice", &path).await.unwrap();

    assert_eq!(run.outcome, FeedOutcome::Complete);
    assert_eq!(run.pages_requested, 4);
    assert_eq!(run.total_items, 450);

    let items = FeedFile::new(&path).load_legacy().unwrap().unwrap();
    let ids = stored_ids(&items);
    assert_eq!(ids.len(), 450);
    assert!(ids.windows(2).all(|w| w[0] > w[1]), "ids not strictly descending");
}

#[tokio::test(start_paused = true)]
async fn test_legacy_feed_resumes_below_smallest_id() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "alice");

    let mut failing = MockFeed::with_items(450);
    failing.fail_calls.insert(2);
    let mut fetcher = PaginatedFetcher::new(failing, &test_config(FeedMode::Legacy));
    assert!(fetcher.fetch("alice", &path).await.is_err());
    assert_eq!(FeedFile::new(&path).load_legacy().unwrap().unwrap().len(), 200);

    let feed = Arc::new(MockFeed::with_items(450));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &test_config(FeedMode::Legacy));
    let run = fetcher.fetch("alice", &path).await.unwrap();

    assert_eq!(run.pages_requested, 3);
    assert_eq!(run.total_items, 450);
    assert_no_duplicates(&FeedFile::new(&path).load_legacy().unwrap().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_legacy_feed_that_does_not_advance_fails() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "alice");
    let mut feed = MockFeed::with_items(450);
    feed.stuck = true;
    let mut fetcher = PaginatedFetcher::new(feed, &test_config(FeedMode::Legacy));

    let result = fetcher.fetch("alice", &path).await;
    assert!(matches!(result, Err(CrawlError::Remote(RemoteError::Unknown(_)))));
}

#[tokio::test(start_paused = true)]
async fn test_inaccessible_feed_is_skipped() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "locked");
    let feed = Arc::new(MockFeed::with_items(10));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &test_config(FeedMode::Cursor));

    let run = fetcher.fetch("locked", &path).await.unwrap();

    assert!(matches!(run.outcome, FeedOutcome::Skipped { .. }));
    assert_eq!(run.pages_requested, 0);
    assert_eq!(feed.calls(), 0);
    assert!(!path.exists());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_account_is_skipped() {
    let dir = TempDir::new().unwrap();
    let path = feed_path(dir.path(), "ghost");
    let feed = Arc::new(MockFeed::with_items(10));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &test_config(FeedMode::Legacy));

    let run = fetcher.fetch("ghost", &path).await.unwrap();

    assert_eq!(
        run.outcome,
        FeedOutcome::Skipped {
            reason: "ghost does not exist".to_string()
        }
    );
    assert_eq!(feed.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_chain_backup() {
    let dir = TempDir::new().unwrap();
    let records = RecordStore::new(dir.path().join("user"));
    for (id, handle, bio) in [
        (1, "alice", "rust"),
        (2, "bob", "rust"),
        (3, "carol", "pottery"),
        (4, "dave", "rust"),
    ] {
        let mut record = AccountRecord::new(id, handle);
        record.bio = bio.to_string();
        records.save(&record).unwrap();
    }

    let backup_dir = dir.path().join("backups");
    let bob = FeedProgress {
        items: vec![json!({"id": 1})],
        top: Some("c0".to_string()),
        bottom: Some("c0".to_string()),
    };
    FeedFile::new(feed_path(&backup_dir, "bob"))
        .save_cursor(&bob)
        .unwrap();

    let feed = Arc::new(MockFeed::with_items(30));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &test_config(FeedMode::Cursor));
    let filter = FilterPredicate::new(["rust"]);

    let report = chain_backup(&mut fetcher, &records, &filter, &backup_dir)
        .await
        .unwrap();

    assert_eq!(report.completed, vec!["alice".to_string()]);
    assert_eq!(report.existing, 1);
    assert_eq!(report.filtered_out, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "dave");

    let alice = FeedFile::new(feed_path(&backup_dir, "alice"))
        .load_cursor()
        .unwrap()
        .unwrap();
    assert_eq!(alice.items.len(), 30);
    assert!(!backup_dir.join("carol").exists());
    assert!(!backup_dir.join("dave").exists());
    assert_eq!(feed.calls(), 1);

    // A rerun only retries what has no backup yet
    let again = chain_backup(&mut fetcher, &records, &filter, Path::new(&backup_dir))
        .await
        .unwrap();
    assert!(again.completed.is_empty());
    assert_eq!(again.existing, 2);
    assert_eq!(again.skipped.len(), 1);
    assert_eq!(feed.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_chain_backup_resumes_partial_feed() {
    let dir = TempDir::new().unwrap();
    let records = RecordStore::new(dir.path().join("user"));
    let mut alice = AccountRecord::new(1, "alice");
    alice.bio = "rust".to_string();
    records.save(&alice).unwrap();

    let backup_dir = dir.path().join("backups");
    let filter = FilterPredicate::new(["rust"]);
    let config = test_config(FeedMode::Cursor);

    let mut failing = MockFeed::with_items(450);
    failing.fail_calls.insert(2);
    let mut fetcher = PaginatedFetcher::new(failing, &config);
    let first = chain_backup(&mut fetcher, &records, &filter, &backup_dir)
        .await
        .unwrap();

    assert!(first.completed.is_empty());
    assert_eq!(first.skipped.len(), 1);
    assert_eq!(first.skipped[0].0, "alice");
    let path = feed_path(&backup_dir, "alice");
    let partial = FeedFile::new(&path).load_cursor().unwrap().unwrap();
    assert_eq!(partial.items.len(), 200);

    // The partial file is picked up past its last page, not counted as done
    let feed = Arc::new(MockFeed::with_items(450));
    let mut fetcher = PaginatedFetcher::new(feed.clone(), &config);
    let again = chain_backup(&mut fetcher, &records, &filter, &backup_dir)
        .await
        .unwrap();

    assert_eq!(again.completed, vec!["alice".to_string()]);
    assert_eq!(again.existing, 0);
    assert!(again.skipped.is_empty());
    assert_eq!(feed.calls(), 2);

    let progress = FeedFile::new(&path).load_cursor().unwrap().unwrap();
    assert_eq!(progress.items.len(), 450);
    assert_no_duplicates(&progress.items);
    assert!(progress.is_exhausted());
}
