//! Media extraction and download for backed-up feeds
//!
//! Media referenced by a feed file `<dir>/tweets.json` is stored under
//! `<dir>/media/`, one file per URL, named after the URL's last path segment.

mod download;
mod extract;

pub use download::{download_all, file_name_for, DownloadReport, DownloadResult, DownloadStatus};
pub use extract::{collect_key_values, media_urls};

use crate::storage::{read_json, StorageError};
use crate::Result;
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Directory receiving the media of the feed file at `feed_file`
pub fn media_dir(feed_file: &Path) -> PathBuf {
    feed_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("media")
}

/// Downloads every media file referenced by one feed file
pub async fn download_feed_media(
    client: &Client,
    feed_file: &Path,
    concurrency: usize,
) -> Result<DownloadReport> {
    let feed: Value = read_json(feed_file)?.ok_or_else(|| {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", feed_file.display()),
        ))
    })?;

    let urls = media_urls(&feed);
    tracing::info!(
        "Downloading {} media files referenced by {}",
        urls.len(),
        feed_file.display()
    );

    let report = download_all(client, urls, &media_dir(feed_file), concurrency).await;
    tracing::info!(
        "{}: {} downloaded, {} already present, {} failed",
        feed_file.display(),
        report.downloaded,
        report.existing,
        report.failed.len()
    );
    Ok(report)
}

/// Downloads the media of every backup under `backup_dir`
///
/// A backup whose feed file cannot be read is reported and skipped.
pub async fn chain_media(
    client: &Client,
    backup_dir: &Path,
    concurrency: usize,
) -> Result<DownloadReport> {
    let mut handles: Vec<PathBuf> = std::fs::read_dir(backup_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    handles.sort();

    let mut total = DownloadReport::default();
    for dir in handles {
        let feed_file = dir.join("tweets.json");
        match download_feed_media(client, &feed_file, concurrency).await {
            Ok(report) => total.merge(report),
            Err(e) => tracing::warn!("Skipped {} because {}", dir.display(), e),
        }
    }
    Ok(total)
}
