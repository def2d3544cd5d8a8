//! Persistence of feed-crawl artifacts

use crate::state::FeedProgress;
use crate::storage::atomic::{read_json, write_json_atomic};
use crate::storage::error::StorageResult;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// The items file of one feed crawl
///
/// Cursor mode stores `[items, top, bottom]`; legacy mode stores a flat
/// array of items.
#[derive(Debug, Clone)]
pub struct FeedFile {
    path: PathBuf,
}

impl FeedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_cursor(&self) -> StorageResult<Option<FeedProgress>> {
        read_json(&self.path)
    }

    pub fn save_cursor(&self, progress: &FeedProgress) -> StorageResult<()> {
        write_json_atomic(&self.path, progress)
    }

    pub fn load_legacy(&self) -> StorageResult<Option<Vec<Value>>> {
        read_json(&self.path)
    }

    pub fn save_legacy(&self, items: &[Value]) -> StorageResult<()> {
        write_json_atomic(&self.path, items)
    }
}
