//! Storage module for persisting crawl data
//!
//! This module handles everything the crawler writes to disk:
//! - The follow-chain frontier (`FrontierStore`)
//! - Account records keyed by id and by handle (`RecordStore`)
//! - Feed-crawl item files (`FeedFile`)
//!
//! All writes are atomic with respect to a crash, so a crawl killed at any
//! point resumes from its last completed checkpoint.

mod atomic;
mod error;
mod feed_file;
pub mod frontier_store;
mod record_store;

pub use atomic::{read_json, write_json_atomic};
pub use error::{StorageError, StorageResult};
pub use feed_file::FeedFile;
pub use frontier_store::FrontierStore;
pub use record_store::RecordStore;

use std::path::{Path, PathBuf};

/// File name of the frontier state under the walk's data directory
pub const FRONTIER_FILE: &str = "meta/frontier.json";

/// Path of the frontier state file for a data directory
pub fn frontier_path(data_dir: &Path) -> PathBuf {
    data_dir.join(FRONTIER_FILE)
}

/// Path of the items file for one account's feed backup
pub fn feed_path(backup_dir: &Path, handle: &str) -> PathBuf {
    backup_dir.join(handle).join("tweets.json")
}
