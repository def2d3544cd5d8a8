//! Remote capabilities consumed by the crawl engine
//!
//! The crawler never talks HTTP directly. It is written against three traits:
//! - [`AccountApi`]: handle resolution, shared by both crawl modes
//! - [`GraphApi`]: neighbor listing and bulk account lookup
//! - [`FeedApi`]: cursor-paged and `max_id`-paged feed listing
//!
//! [`HttpApi`] implements both over `reqwest`; tests substitute in-memory
//! implementations.

mod http;
mod timeline;

pub use http::{build_download_client, build_http_client, classify_status, HttpApi};
pub use timeline::parse_timeline;

use crate::state::{AccountRecord, FeedPage};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service asked us to slow down
    #[error("Throttled by {endpoint}")]
    Throttled { endpoint: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Anything else. Propagated, never retried.
    #[error("{0}")]
    Unknown(String),
}

/// One page of a neighbor-id listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborPage {
    pub ids: Vec<u64>,

    /// Cursor for the following page, `None` on the last page
    pub next_cursor: Option<i64>,
}

/// Handle resolution
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Resolves a handle to the durable numeric id records and feeds are
    /// keyed by
    async fn lookup(&self, handle: &str) -> Result<u64, RemoteError>;
}

/// Follow-graph capability
#[async_trait]
pub trait GraphApi: AccountApi {
    /// Lists one page of the ids `handle` follows
    async fn get_neighbors(
        &self,
        handle: &str,
        cursor: Option<i64>,
        count: u32,
    ) -> Result<NeighborPage, RemoteError>;

    /// Fetches full records for at most 100 ids
    async fn get_records(&self, ids: &[u64]) -> Result<Vec<AccountRecord>, RemoteError>;
}

/// Feed capability
#[async_trait]
pub trait FeedApi: AccountApi {
    /// Fetches the page after `cursor` (the first page when `None`)
    async fn get_page(
        &self,
        user_id: u64,
        cursor: Option<&str>,
        count: u32,
    ) -> Result<FeedPage, RemoteError>;

    /// Fetches up to `count` items with ids at most `max_id`
    async fn get_legacy_page(
        &self,
        user_id: u64,
        max_id: Option<u64>,
        count: u32,
    ) -> Result<Vec<Value>, RemoteError>;
}

#[async_trait]
impl<T: AccountApi + ?Sized> AccountApi for Arc<T> {
    async fn lookup(&self, handle: &str) -> Result<u64, RemoteError> {
        (**self).lookup(handle).await
    }
}

#[async_trait]
impl<T: GraphApi + ?Sized> GraphApi for Arc<T> {
    async fn get_neighbors(
        &self,
        handle: &str,
        cursor: Option<i64>,
        count: u32,
    ) -> Result<NeighborPage, RemoteError> {
        (**self).get_neighbors(handle, cursor, count).await
    }

    async fn get_records(&self, ids: &[u64]) -> Result<Vec<AccountRecord>, RemoteError> {
        (**self).get_records(ids).await
    }
}

#[async_trait]
impl<T: FeedApi + ?Sized> FeedApi for Arc<T> {
    async fn get_page(
        &self,
        user_id: u64,
        cursor: Option<&str>,
        count: u32,
    ) -> Result<FeedPage, RemoteError> {
        (**self).get_page(user_id, cursor, count).await
    }

    async fn get_legacy_page(
        &self,
        user_id: u64,
        max_id: Option<u64>,
        count: u32,
    ) -> Result<Vec<Value>, RemoteError> {
        (**self).get_legacy_page(user_id, max_id, count).await
    }
}
