use crate::filter::default_keywords;
use crate::state::TargetCount;
use serde::Deserialize;

/// Main configuration structure for Chainwalk
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(rename = "rate-limits", default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

/// Remote service endpoints and credentials
///
/// Credentials are attached to every request as-is; obtaining them is the
/// operator's business.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST endpoints (friends/ids, users/lookup, ...)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// URL of the cursor-paged timeline endpoint
    #[serde(rename = "timeline-url", default)]
    pub timeline_url: Option<String>,

    /// Bearer token sent in the Authorization header
    #[serde(rename = "bearer-token")]
    pub bearer_token: String,

    /// Optional CSRF token sent as x-csrf-token
    #[serde(rename = "csrf-token", default)]
    pub csrf_token: Option<String>,

    /// Optional raw Cookie header
    #[serde(default)]
    pub cookie: Option<String>,

    /// User agent string
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-seconds", default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// Quota of one endpoint category: `requests` per `window-seconds`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct QuotaConfig {
    pub requests: u32,

    #[serde(rename = "window-seconds")]
    pub window_seconds: u64,

    /// Extra spacing added to every computed delay (milliseconds)
    #[serde(rename = "padding-ms", default)]
    pub padding_ms: u64,
}

/// Per-endpoint request budgets
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    #[serde(rename = "graph-neighbors", default = "default_graph_quota")]
    pub graph_neighbors: QuotaConfig,

    #[serde(rename = "record-lookup", default = "default_lookup_quota")]
    pub record_lookup: QuotaConfig,

    #[serde(rename = "feed-listing", default = "default_feed_quota")]
    pub feed_listing: QuotaConfig,

    /// Pause after a throttle response, distinct from the regular spacing
    #[serde(rename = "throttle-cooldown-seconds", default = "default_cooldown")]
    pub throttle_cooldown_seconds: u64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            graph_neighbors: default_graph_quota(),
            record_lookup: default_lookup_quota(),
            feed_listing: default_feed_quota(),
            throttle_cooldown_seconds: default_cooldown(),
        }
    }
}

/// What to do with an account whose neighbor list is not accessible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnauthorizedPolicy {
    /// Drop it for this pass, leaving it eligible if rediscovered
    #[default]
    Skip,
    /// Stop the crawl
    Abort,
}

/// Next-frontier selection policy
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum SelectionConfig {
    /// Queue every matching account
    #[default]
    All,
    /// Queue a reproducible sample, weighted by follower count
    Sample {
        #[serde(rename = "sample-size")]
        sample_size: usize,
        #[serde(default)]
        seed: u64,
    },
}

/// Follow-chain walk configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Directory holding records and the frontier state
    #[serde(rename = "data-dir", default = "default_data_dir")]
    pub data_dir: String,

    /// Seed handle used when no crawl state exists yet
    #[serde(default)]
    pub seed: Option<String>,

    /// Number of accounts to download before stopping
    #[serde(default)]
    pub target: TargetCount,

    /// Ids requested per neighbor-list page
    #[serde(rename = "neighbor-page-size", default = "default_neighbor_page_size")]
    pub neighbor_page_size: u32,

    /// Upper bound on neighbor-list pages fetched per account
    #[serde(rename = "max-neighbor-pages", default = "default_max_neighbor_pages")]
    pub max_neighbor_pages: u32,

    /// Ids per bulk lookup (the remote endpoint accepts at most 100)
    #[serde(rename = "lookup-batch-size", default = "default_lookup_batch_size")]
    pub lookup_batch_size: usize,

    #[serde(rename = "on-unauthorized", default)]
    pub on_unauthorized: UnauthorizedPolicy,

    /// Relevance keywords, matched case-insensitively
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub selection: SelectionConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            seed: None,
            target: TargetCount::Infinite,
            neighbor_page_size: default_neighbor_page_size(),
            max_neighbor_pages: default_max_neighbor_pages(),
            lookup_batch_size: default_lookup_batch_size(),
            on_unauthorized: UnauthorizedPolicy::Skip,
            keywords: default_keywords(),
            selection: SelectionConfig::All,
        }
    }
}

/// How the feed is paginated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedMode {
    /// Opaque top/bottom cursor pairs
    #[default]
    Cursor,
    /// `max_id` below the smallest id seen so far
    Legacy,
}

/// Feed crawl configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Directory receiving `<handle>/tweets.json`
    #[serde(rename = "backup-dir", default = "default_backup_dir")]
    pub backup_dir: String,

    /// Items requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub mode: FeedMode,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            page_size: default_page_size(),
            mode: FeedMode::Cursor,
        }
    }
}

/// Media download configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Maximum downloads in flight
    #[serde(default = "default_media_concurrency")]
    pub concurrency: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            concurrency: default_media_concurrency(),
        }
    }
}

fn default_user_agent() -> String {
    format!("chainwalk/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_graph_quota() -> QuotaConfig {
    QuotaConfig {
        requests: 15,
        window_seconds: 900,
        padding_ms: 1000,
    }
}

fn default_lookup_quota() -> QuotaConfig {
    QuotaConfig {
        requests: 900,
        window_seconds: 900,
        padding_ms: 0,
    }
}

fn default_feed_quota() -> QuotaConfig {
    QuotaConfig {
        requests: 6,
        window_seconds: 60,
        padding_ms: 0,
    }
}

fn default_cooldown() -> u64 {
    120
}

fn default_data_dir() -> String {
    "data/user".to_string()
}

fn default_neighbor_page_size() -> u32 {
    5000
}

fn default_max_neighbor_pages() -> u32 {
    5
}

fn default_lookup_batch_size() -> usize {
    100
}

fn default_backup_dir() -> String {
    "backups".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_media_concurrency() -> usize {
    8
}

impl Config {
    /// Builds a configuration with defaults for everything but the API
    pub fn with_api(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                timeline_url: None,
                bearer_token: bearer_token.into(),
                csrf_token: None,
                cookie: None,
                user_agent: default_user_agent(),
                request_timeout_seconds: default_request_timeout(),
            },
            rate_limits: RateLimitsConfig::default(),
            graph: GraphConfig::default(),
            feed: FeedConfig::default(),
            media: MediaConfig::default(),
        }
    }
}
