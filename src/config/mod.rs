//! Configuration module for Chainwalk
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use chainwalk::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Throttle cooldown: {}s", config.rate_limits.throttle_cooldown_seconds);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, FeedConfig, FeedMode, GraphConfig, MediaConfig, QuotaConfig,
    RateLimitsConfig, SelectionConfig, UnauthorizedPolicy,
};
pub use validation::MAX_LOOKUP_BATCH;

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
