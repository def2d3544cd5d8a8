//! Persistence of the follow-chain frontier

use crate::state::FrontierState;
use crate::storage::atomic::{read_json, write_json_atomic};
use crate::storage::error::{StorageError, StorageResult};
use std::path::{Path, PathBuf};

/// Loads a frontier from `path`
///
/// Returns `Ok(None)` if no crawl has been started there yet. A file that
/// does not parse, or that violates the frontier invariants, is reported as
/// [`StorageError::CorruptState`] and left untouched for the operator.
pub fn load(path: &Path) -> StorageResult<Option<FrontierState>> {
    let Some(state) = read_json::<FrontierState>(path)? else {
        return Ok(None);
    };

    state
        .check_invariants()
        .map_err(|reason| StorageError::CorruptState {
            path: path.display().to_string(),
            reason,
        })?;

    Ok(Some(state))
}

/// Atomically writes `state` to `path`
pub fn save(state: &FrontierState, path: &Path) -> StorageResult<()> {
    write_json_atomic(path, state)
}

/// Frontier store bound to one state file
#[derive(Debug, Clone)]
pub struct FrontierStore {
    path: PathBuf,
}

impl FrontierStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> StorageResult<Option<FrontierState>> {
        load(&self.path)
    }

    pub fn save(&self, state: &FrontierState) -> StorageResult<()> {
        save(state, &self.path)
    }

    /// Returns true if a state file exists
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}
