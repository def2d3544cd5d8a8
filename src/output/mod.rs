//! Output module for crawl progress reports
//!
//! This module handles:
//! - Reading crawl progress back from the checkpoint files
//! - Printing progress and end-of-run summaries

pub mod stats;

pub use stats::{load_statistics, print_statistics, FrontierStatistics};

use crate::crawler::{BackupReport, FeedOutcome, FeedRun, WalkReport, WalkStop};
use crate::media::DownloadReport;

/// Prints the summary of a finished walk
pub fn print_walk_report(report: &WalkReport) {
    let stop = match report.stop {
        WalkStop::TargetReached => "target reached",
        WalkStop::FrontierExhausted => "frontier exhausted",
    };
    println!("Walk finished ({}) after {} steps", stop, report.steps);
    println!("  Downloaded: {}", report.downloaded);
    println!(
        "  Requests: {} ({} throttled)",
        report.requests, report.throttles
    );
    println!("  Done: {}", report.state.done_set.len());
    println!(
        "  Queued: {} current, {} next",
        report.state.current_set.len(),
        report.state.next_set.len()
    );
}

/// Prints the summary of one feed fetch
pub fn print_feed_run(run: &FeedRun) {
    match &run.outcome {
        FeedOutcome::Complete => println!(
            "Feed of {} complete: {} items ({} page requests this run)",
            run.handle, run.total_items, run.pages_requested
        ),
        FeedOutcome::Skipped { reason } => println!(
            "Feed of {} skipped: {} ({} items stored)",
            run.handle, reason, run.total_items
        ),
    }
}

/// Prints the summary of a chain backup
pub fn print_backup_report(report: &BackupReport) {
    println!("Chain backup finished");
    println!("  Completed: {}", report.completed.len());
    println!("  Already present: {}", report.existing);
    println!("  Filtered out: {}", report.filtered_out);
    if !report.skipped.is_empty() {
        println!("  Skipped ({}):", report.skipped.len());
        for (handle, reason) in &report.skipped {
            println!("    - {}: {}", handle, reason);
        }
    }
}

/// Prints the summary of a media download
pub fn print_download_report(report: &DownloadReport) {
    println!(
        "Media: {} downloaded, {} already present, {} failed",
        report.downloaded,
        report.existing,
        report.failed.len()
    );
    for (url, reason) in &report.failed {
        println!("  - {}: {}", url, reason);
    }
}
