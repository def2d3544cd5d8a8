//! Feed backups for every relevant account the walk has stored

use crate::crawler::feed_fetcher::{FeedOutcome, PaginatedFetcher};
use crate::filter::FilterPredicate;
use crate::remote::FeedApi;
use crate::storage::{feed_path, RecordStore};
use crate::{CrawlError, Result};
use std::path::Path;

/// Summary of a chain backup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    /// Handles whose feed was fetched to the end
    pub completed: Vec<String>,
    /// Handles skipped, with the reason
    pub skipped: Vec<(String, String)>,
    /// Handles whose stored feed was already complete
    pub existing: usize,
    /// Stored accounts the filter rejected
    pub filtered_out: usize,
}

/// Backs up the feed of every stored account that passes `filter`
///
/// Every account goes through [`PaginatedFetcher::fetch`], which resumes a
/// partial feed file past its last stored page and returns without a request
/// for a complete one. An interrupted chain backup therefore picks up where
/// it stopped. An account that cannot be fetched is reported, followed by
/// the throttle cooldown, and the loop moves on. Storage failures abort.
pub async fn chain_backup<F: FeedApi>(
    fetcher: &mut PaginatedFetcher<F>,
    records: &RecordStore,
    filter: &FilterPredicate,
    backup_dir: &Path,
) -> Result<BackupReport> {
    let accounts = records.all_by_handle()?;
    tracing::info!(
        "Chain backup over {} stored accounts into {}",
        accounts.len(),
        backup_dir.display()
    );

    let mut report = BackupReport::default();
    for record in accounts {
        if !filter.matches(&record) {
            report.filtered_out += 1;
            continue;
        }
        let path = feed_path(backup_dir, &record.handle);
        let reason = match fetcher.fetch(&record.handle, &path).await {
            Ok(run) => match run.outcome {
                FeedOutcome::Complete if run.pages_requested == 0 => {
                    report.existing += 1;
                    continue;
                }
                FeedOutcome::Complete => {
                    report.completed.push(record.handle);
                    continue;
                }
                FeedOutcome::Skipped { reason } => reason,
            },
            Err(CrawlError::Remote(err)) => {
                tracing::warn!("Skipped {} because {}", record.handle, err);
                err.to_string()
            }
            Err(err) => return Err(err),
        };

        report.skipped.push((record.handle, reason));
        fetcher.policy().cool_down("skipping an account").await;
    }

    tracing::info!(
        "Chain backup finished: {} completed, {} skipped, {} already present",
        report.completed.len(),
        report.skipped.len(),
        report.existing
    );
    Ok(report)
}
