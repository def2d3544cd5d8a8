//! On-disk account records
//!
//! Layout under the store root:
//!
//! - `by-id/<id>.json`: canonical copy, keyed by the immutable id
//! - `by-handle/<handle>.json`: alias copy, may go stale after a rename

use crate::state::AccountRecord;
use crate::storage::atomic::{read_json, write_json_atomic};
use crate::storage::error::StorageResult;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const BY_ID_DIR: &str = "by-id";
const BY_HANDLE_DIR: &str = "by-handle";

/// JSON-file store of account records
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn id_path(&self, id: u64) -> PathBuf {
        self.root.join(BY_ID_DIR).join(format!("{}.json", id))
    }

    fn handle_path(&self, handle: &str) -> PathBuf {
        self.root.join(BY_HANDLE_DIR).join(format!("{}.json", handle))
    }

    /// Persists a record under its id, then under its handle
    ///
    /// The id copy is written first: once it exists the id counts as
    /// downloaded.
    pub fn save(&self, record: &AccountRecord) -> StorageResult<()> {
        write_json_atomic(&self.id_path(record.id), record)?;

        if is_safe_file_stem(&record.handle) {
            write_json_atomic(&self.handle_path(&record.handle), record)?;
        } else {
            tracing::warn!(
                "Not writing handle alias for account {}: unusable handle {:?}",
                record.id,
                record.handle
            );
        }
        Ok(())
    }

    /// Loads the canonical record for `id`
    pub fn load(&self, id: u64) -> StorageResult<Option<AccountRecord>> {
        read_json(&self.id_path(id))
    }

    /// Loads the alias record for `handle`
    pub fn load_by_handle(&self, handle: &str) -> StorageResult<Option<AccountRecord>> {
        if !is_safe_file_stem(handle) {
            return Ok(None);
        }
        read_json(&self.handle_path(handle))
    }

    /// Rebuilds the set of downloaded ids from the canonical record files
    pub fn downloaded_ids(&self) -> StorageResult<HashSet<u64>> {
        let mut ids = HashSet::new();
        for stem in json_stems(&self.root.join(BY_ID_DIR))? {
            if let Ok(id) = stem.parse::<u64>() {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    /// Loads every record stored under a handle, sorted by handle
    pub fn all_by_handle(&self) -> StorageResult<Vec<AccountRecord>> {
        let mut stems = json_stems(&self.root.join(BY_HANDLE_DIR))?;
        stems.sort();

        let mut records = Vec::with_capacity(stems.len());
        for stem in stems {
            if let Some(record) = read_json(&self.handle_path(&stem))? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Lists `<stem>.json` files in `dir`, skipping temp files
fn json_stems(dir: &Path) -> StorageResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut stems = Vec::new();
    for entry in entries {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with('.') {
            continue;
        }
        if let Some(stem) = name.strip_suffix(".json") {
            stems.push(stem.to_string());
        }
    }
    Ok(stems)
}

fn is_safe_file_stem(handle: &str) -> bool {
    !handle.is_empty()
        && !handle.starts_with('.')
        && !handle.contains(['/', '\\'])
        && !handle.contains('\0')
}
