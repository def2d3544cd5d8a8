//! Statistics generation from the on-disk crawl state
//!
//! This module provides functionality for extracting and displaying the
//! progress of a crawl from its checkpoint files, without contacting the
//! remote service.

use crate::config::Config;
use crate::state::TargetCount;
use crate::storage::{frontier_path, FrontierStore, RecordStore};
use crate::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierStatistics {
    /// Whether a walk has been started at all
    pub started: bool,

    /// Handles fully expanded
    pub done: usize,

    /// Handles queued on the current level
    pub current: usize,

    /// Handles queued for the next level
    pub next: usize,

    /// Account records on disk
    pub downloaded: usize,

    pub target: TargetCount,

    /// Modification time of the frontier file
    pub last_checkpoint: Option<DateTime<Utc>>,

    /// Accounts with a feed backup directory
    pub backups: usize,
}

/// Loads statistics from the configured data and backup directories
///
/// A missing frontier file is reported as a walk that has not started; a
/// corrupt one is an error.
pub fn load_statistics(config: &Config) -> Result<FrontierStatistics> {
    let data_dir = Path::new(&config.graph.data_dir);
    let store = FrontierStore::new(frontier_path(data_dir));
    let state = store.load()?;
    let downloaded = RecordStore::new(data_dir).downloaded_ids()?.len();

    let last_checkpoint = std::fs::metadata(store.path())
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    let backups = match std::fs::read_dir(&config.feed.backup_dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .count(),
        Err(_) => 0,
    };

    Ok(match state {
        Some(state) => FrontierStatistics {
            started: true,
            done: state.done_set.len(),
            current: state.current_set.len(),
            next: state.next_set.len(),
            downloaded,
            target: state.n,
            last_checkpoint,
            backups,
        },
        None => FrontierStatistics {
            started: false,
            done: 0,
            current: 0,
            next: 0,
            downloaded,
            target: config.graph.target,
            last_checkpoint: None,
            backups,
        },
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &FrontierStatistics) {
    println!("=== Crawl Statistics ===\n");

    if !stats.started {
        println!("No walk has been started yet.\n");
    }

    println!("Frontier:");
    println!("  Done: {}", stats.done);
    println!("  Current level: {}", stats.current);
    println!("  Next level: {}", stats.next);
    println!();

    println!("Records:");
    match stats.target {
        TargetCount::Finite(n) if n > 0 => {
            let percentage = (stats.downloaded as f64 / n as f64) * 100.0;
            println!(
                "  Downloaded: {} of {} ({:.1}%)",
                stats.downloaded, n, percentage
            );
        }
        target => println!("  Downloaded: {} (target: {})", stats.downloaded, target),
    }
    println!("  Feed backups: {}", stats.backups);
    println!();

    if let Some(at) = stats.last_checkpoint {
        println!("Last checkpoint: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}
