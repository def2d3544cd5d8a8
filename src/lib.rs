//! Chainwalk: a resumable, rate-limited social-graph and feed crawler
//!
//! This crate retrieves account records by walking the follow graph outward
//! from a seed account, and retrieves full post histories by exhaustive
//! pagination. Every unit of work is checkpointed to disk so a crawl can be
//! killed at any point and resumed without losing or repeating work.

pub mod config;
pub mod crawler;
pub mod filter;
pub mod media;
pub mod output;
pub mod remote;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    /// A remote failure that could not be classified. Never retried.
    #[error("Remote call failed: {0}")]
    Remote(#[from] remote::RemoteError),

    #[error("Unauthorized while expanding {handle}: {message}")]
    Unauthorized { handle: String, message: String },

    #[error("No saved crawl state at {path}; start a fresh crawl with a seed handle")]
    NoSavedState { path: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Returns true when the error means persisted state cannot be trusted
    pub fn is_corrupt_state(&self) -> bool {
        matches!(
            self,
            Self::Storage(storage::StorageError::CorruptState { .. })
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid header value for {0}")]
    InvalidHeader(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use filter::FilterPredicate;
pub use state::{AccountRecord, FeedProgress, FrontierState, TargetCount};
