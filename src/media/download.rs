//! Bounded-concurrency media downloads

use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use url::Url;

/// What happened to one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloaded { bytes: usize },
    /// The target file was already present
    Existing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub url: String,
    pub status: DownloadStatus,
}

/// Totals over a batch of downloads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub existing: usize,
    /// `(url, reason)` of every failed download
    pub failed: Vec<(String, String)>,
}

impl DownloadReport {
    pub fn merge(&mut self, other: DownloadReport) {
        self.downloaded += other.downloaded;
        self.existing += other.existing;
        self.failed.extend(other.failed);
    }

    fn record(&mut self, result: DownloadResult) {
        match result.status {
            DownloadStatus::Downloaded { .. } => self.downloaded += 1,
            DownloadStatus::Existing => self.existing += 1,
            DownloadStatus::Failed(reason) => {
                tracing::warn!("Failed to download {}: {}", result.url, reason);
                self.failed.push((result.url, reason));
            }
        }
    }
}

/// File name a URL is stored under: its last non-empty path segment
pub fn file_name_for(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// Downloads every URL into `dir`, at most `concurrency` at a time
///
/// Files that already exist are not fetched again. A failure is recorded
/// for its URL and does not stop the others.
pub async fn download_all(
    client: &Client,
    urls: Vec<String>,
    dir: &Path,
    concurrency: usize,
) -> DownloadReport {
    let downloads = urls.into_iter().map(|url| {
        let client = client.clone();
        let dir = dir.to_path_buf();
        async move { download_one(client, url, dir).await }
    });

    let results: Vec<DownloadResult> = stream::iter(downloads)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = DownloadReport::default();
    for result in results {
        report.record(result);
    }
    report
}

async fn download_one(client: Client, url: String, dir: PathBuf) -> DownloadResult {
    let status = match fetch_to(&client, &url, &dir).await {
        Ok(status) => status,
        Err(reason) => DownloadStatus::Failed(reason),
    };
    DownloadResult { url, status }
}

async fn fetch_to(
    client: &Client,
    url: &str,
    dir: &Path,
) -> std::result::Result<DownloadStatus, String> {
    let name = file_name_for(url).ok_or_else(|| "URL has no file name".to_string())?;
    let target = dir.join(&name);
    if target.is_file() {
        return Ok(DownloadStatus::Existing);
    }

    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;

    write_atomic(&target, &bytes).map_err(|e| e.to_string())?;
    tracing::debug!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(DownloadStatus::Downloaded { bytes: bytes.len() })
}

fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
