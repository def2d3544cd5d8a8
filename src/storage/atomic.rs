//! Crash-safe JSON file writes
//!
//! Every persisted artifact goes through [`write_json_atomic`]: the value is
//! serialized into a temporary file in the destination directory, synced,
//! and renamed over the destination. A crash leaves either the old file or
//! the new one on disk, never a truncated mix.

use crate::storage::error::{StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically replaces `path` with the pretty-printed JSON of `value`
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|source| StorageError::Persist {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Reads a JSON file, returning `Ok(None)` if it does not exist
///
/// Parse failures surface as [`StorageError::CorruptState`] naming the file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StorageError::CorruptState {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}
