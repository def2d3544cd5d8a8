use crate::config::types::{
    ApiConfig, Config, FeedConfig, GraphConfig, MediaConfig, QuotaConfig, RateLimitsConfig,
    SelectionConfig,
};
use crate::ConfigError;
use url::Url;

/// Hard ceiling of the remote bulk-lookup endpoint
pub const MAX_LOOKUP_BATCH: usize = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_rate_limits(&config.rate_limits)?;
    validate_graph_config(&config.graph)?;
    validate_feed_config(&config.feed)?;
    validate_media_config(&config.media)?;
    Ok(())
}

/// Validates endpoint URLs and credentials
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;

    if let Some(timeline_url) = &config.timeline_url {
        validate_http_url("timeline-url", timeline_url)?;
    }

    if config.bearer_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "bearer-token cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-seconds must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

/// Validates every per-endpoint quota
fn validate_rate_limits(config: &RateLimitsConfig) -> Result<(), ConfigError> {
    validate_quota("graph-neighbors", &config.graph_neighbors)?;
    validate_quota("record-lookup", &config.record_lookup)?;
    validate_quota("feed-listing", &config.feed_listing)?;
    Ok(())
}

fn validate_quota(name: &str, quota: &QuotaConfig) -> Result<(), ConfigError> {
    if quota.requests < 1 {
        return Err(ConfigError::Validation(format!(
            "{}: requests must be >= 1, got {}",
            name, quota.requests
        )));
    }

    if quota.window_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "{}: window-seconds must be >= 1, got {}",
            name, quota.window_seconds
        )));
    }

    Ok(())
}

/// Validates the follow-chain walk settings
fn validate_graph_config(config: &GraphConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "graph data-dir cannot be empty".to_string(),
        ));
    }

    if config.lookup_batch_size < 1 || config.lookup_batch_size > MAX_LOOKUP_BATCH {
        return Err(ConfigError::Validation(format!(
            "lookup-batch-size must be between 1 and {}, got {}",
            MAX_LOOKUP_BATCH, config.lookup_batch_size
        )));
    }

    if config.neighbor_page_size < 1 {
        return Err(ConfigError::Validation(
            "neighbor-page-size must be >= 1".to_string(),
        ));
    }

    if config.max_neighbor_pages < 1 {
        return Err(ConfigError::Validation(
            "max-neighbor-pages must be >= 1".to_string(),
        ));
    }

    if config.keywords.is_empty() {
        return Err(ConfigError::Validation(
            "keywords cannot be empty".to_string(),
        ));
    }

    if config.keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "keywords cannot contain blank entries".to_string(),
        ));
    }

    if let SelectionConfig::Sample { sample_size, .. } = config.selection {
        if sample_size < 1 {
            return Err(ConfigError::Validation(
                "selection sample-size must be >= 1".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates the feed crawl settings
fn validate_feed_config(config: &FeedConfig) -> Result<(), ConfigError> {
    if config.backup_dir.is_empty() {
        return Err(ConfigError::Validation(
            "feed backup-dir cannot be empty".to_string(),
        ));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "feed page-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_media_config(config: &MediaConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "media concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }
    Ok(())
}
