//! Chainwalk main entry point
//!
//! This is the command-line interface for the Chainwalk crawler.

use anyhow::{bail, Context};
use chainwalk::config::{load_config_with_hash, Config, FeedMode, SelectionConfig};
use chainwalk::crawler::{chain_backup, Endpoint, GraphWalker, PaginatedFetcher, RateGate};
use chainwalk::media::{chain_media, download_feed_media};
use chainwalk::output::{
    load_statistics, print_backup_report, print_download_report, print_feed_run,
    print_statistics, print_walk_report,
};
use chainwalk::remote::{build_download_client, HttpApi};
use chainwalk::storage::{feed_path, frontier_path, FrontierStore, RecordStore};
use chainwalk::{FilterPredicate, TargetCount};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Chainwalk: a resumable, rate-limited follow-graph and feed crawler
///
/// Chainwalk walks the follow graph outward from a seed account, keeping
/// the accounts that match a keyword filter, and backs up full feeds by
/// exhaustive pagination. Every step is checkpointed, so any command can be
/// interrupted and rerun to continue where it stopped.
#[derive(Parser, Debug)]
#[command(name = "chainwalk")]
#[command(version)]
#[command(about = "A resumable follow-graph and feed crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk the follow graph (resumes an interrupted walk by default)
    Graph {
        /// Seed handle for a fresh walk (defaults to graph.seed)
        #[arg(long)]
        seed: Option<String>,

        /// Number of records to download, or "infinity"
        #[arg(long)]
        target: Option<TargetCount>,

        /// Start a fresh walk, discarding the saved frontier
        #[arg(long)]
        fresh: bool,
    },

    /// Back up the full feed of one account
    Feed {
        handle: String,

        /// Page by max_id instead of cursors
        #[arg(long)]
        legacy: bool,

        /// Do not download the media referenced by the feed
        #[arg(long)]
        no_media: bool,
    },

    /// Back up the feed of every stored account that passes the filter
    ChainBackup,

    /// Download the media referenced by one feed file
    Media {
        #[arg(value_name = "ITEMS_JSON")]
        items: PathBuf,
    },

    /// Download the media of every feed backup
    ChainMedia,

    /// Show crawl progress from the checkpoint files and exit
    Status,

    /// Validate config and show what would be crawled without crawling
    DryRun,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Graph {
            seed,
            target,
            fresh,
        } => handle_graph(&config, seed, target, fresh).await,
        Command::Feed {
            handle,
            legacy,
            no_media,
        } => handle_feed(&config, &handle, legacy, no_media).await,
        Command::ChainBackup => handle_chain_backup(&config).await,
        Command::Media { items } => handle_media(&config, &items).await,
        Command::ChainMedia => handle_chain_media(&config).await,
        Command::Status => handle_status(&config),
        Command::DryRun => handle_dry_run(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("chainwalk=info,warn"),
            1 => EnvFilter::new("chainwalk=debug,info"),
            2 => EnvFilter::new("chainwalk=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the graph command: starts or resumes the follow-chain walk
async fn handle_graph(
    config: &Config,
    seed: Option<String>,
    target: Option<TargetCount>,
    fresh: bool,
) -> anyhow::Result<()> {
    let api = HttpApi::new(&config.api)?;
    let mut walker = GraphWalker::new(api, config)?;

    let saved = walker.frontier_store().exists();
    let state = if fresh || !saved {
        let Some(seed) = seed.or_else(|| config.graph.seed.clone()) else {
            bail!("No saved walk to resume; pass --seed or set graph.seed to start one");
        };
        walker.start(&seed, target.unwrap_or(config.graph.target))?
    } else {
        let mut state = walker.resume().map_err(|e| {
            if e.is_corrupt_state() {
                tracing::error!("Saved frontier is corrupt; fix or remove it to continue");
            }
            e
        })?;
        if let Some(target) = target {
            state.n = target;
        }
        state
    };

    let report = walker.run(state).await?;
    print_walk_report(&report);
    Ok(())
}

/// Handles the feed command: backs up one account's feed
async fn handle_feed(
    config: &Config,
    handle: &str,
    legacy: bool,
    no_media: bool,
) -> anyhow::Result<()> {
    let api = HttpApi::new(&config.api)?;
    let mode = if legacy {
        FeedMode::Legacy
    } else {
        config.feed.mode
    };
    let mut fetcher = PaginatedFetcher::new(api, config).with_mode(mode);

    let path = feed_path(Path::new(&config.feed.backup_dir), handle);
    let run = fetcher.fetch(handle, &path).await?;
    print_feed_run(&run);

    if !no_media && path.is_file() {
        let client = build_download_client(&config.api)?;
        let report = download_feed_media(&client, &path, config.media.concurrency).await?;
        print_download_report(&report);
    }
    Ok(())
}

/// Handles the chain-backup command
async fn handle_chain_backup(config: &Config) -> anyhow::Result<()> {
    let api = HttpApi::new(&config.api)?;
    let mut fetcher = PaginatedFetcher::new(api, config);
    let records = RecordStore::new(&config.graph.data_dir);
    let filter = FilterPredicate::new(&config.graph.keywords);

    let report = chain_backup(
        &mut fetcher,
        &records,
        &filter,
        Path::new(&config.feed.backup_dir),
    )
    .await?;
    print_backup_report(&report);
    Ok(())
}

/// Handles the media command
async fn handle_media(config: &Config, items: &Path) -> anyhow::Result<()> {
    let client = build_download_client(&config.api)?;
    let report = download_feed_media(&client, items, config.media.concurrency).await?;
    print_download_report(&report);
    Ok(())
}

/// Handles the chain-media command
async fn handle_chain_media(config: &Config) -> anyhow::Result<()> {
    let client = build_download_client(&config.api)?;
    let report = chain_media(
        &client,
        Path::new(&config.feed.backup_dir),
        config.media.concurrency,
    )
    .await?;
    print_download_report(&report);
    Ok(())
}

/// Handles the status command: shows progress from the checkpoint files
fn handle_status(config: &Config) -> anyhow::Result<()> {
    let stats = load_statistics(config)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the dry-run command: validates config and shows what would run
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Chainwalk Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!(
        "  Timeline URL: {}",
        config.api.timeline_url.as_deref().unwrap_or("(not set)")
    );
    println!("  User agent: {}", config.api.user_agent);
    println!("  CSRF token: {}", presence(&config.api.csrf_token));
    println!("  Cookie: {}", presence(&config.api.cookie));

    println!("\nRate Limits:");
    let gate = RateGate::new(&config.rate_limits);
    for (endpoint, quota) in [
        (Endpoint::GraphNeighbors, &config.rate_limits.graph_neighbors),
        (Endpoint::RecordLookup, &config.rate_limits.record_lookup),
        (Endpoint::FeedListing, &config.rate_limits.feed_listing),
    ] {
        let spacing = gate.delay_for(endpoint);
        println!(
            "  {}: {} per {}s (one every {:.1}s)",
            endpoint,
            quota.requests,
            quota.window_seconds,
            spacing.as_secs_f64()
        );
    }
    println!(
        "  Throttle cooldown: {}s",
        config.rate_limits.throttle_cooldown_seconds
    );

    println!("\nGraph Walk:");
    println!("  Data directory: {}", config.graph.data_dir);
    println!(
        "  Seed: {}",
        config.graph.seed.as_deref().unwrap_or("(not set)")
    );
    println!("  Target: {}", config.graph.target);
    println!(
        "  Neighbor pages: up to {} of {}",
        config.graph.max_neighbor_pages, config.graph.neighbor_page_size
    );
    println!("  Lookup batch: {}", config.graph.lookup_batch_size);
    println!("  On unauthorized: {:?}", config.graph.on_unauthorized);
    match &config.graph.selection {
        SelectionConfig::All => println!("  Selection: all matches"),
        SelectionConfig::Sample { sample_size, seed } => println!(
            "  Selection: weighted sample of {} (seed {})",
            sample_size, seed
        ),
    }
    println!("  Keywords ({}):", config.graph.keywords.len());
    for keyword in &config.graph.keywords {
        println!("    * {:?}", keyword);
    }

    let data_dir = Path::new(&config.graph.data_dir);
    let saved = FrontierStore::new(frontier_path(data_dir)).exists();
    println!(
        "  Saved frontier: {}",
        if saved { "yes (will resume)" } else { "no" }
    );

    println!("\nFeed:");
    println!("  Backup directory: {}", config.feed.backup_dir);
    println!("  Page size: {}", config.feed.page_size);
    println!("  Mode: {:?}", config.feed.mode);

    println!("\nMedia:");
    println!("  Concurrency: {}", config.media.concurrency);

    println!("\n✓ Configuration is valid");
    Ok(())
}

fn presence(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "set"
    } else {
        "not set"
    }
}
