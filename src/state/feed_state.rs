//! Pagination state for feed crawls

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a cursor-driven feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    /// Items on this page, newest first
    pub items: Vec<Value>,

    /// Cursor marking the top of this page's window
    pub top: Option<String>,

    /// Cursor to request the next (older) page with
    pub bottom: Option<String>,
}

impl FeedPage {
    /// Returns true if no further page can follow this one
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.bottom.is_none() || self.top == self.bottom
    }
}

type FeedTuple = (Vec<Value>, Option<String>, Option<String>);

/// Accumulated progress of a cursor-mode feed crawl
///
/// Persisted as the JSON array `[items, top, bottom]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "FeedTuple", into = "FeedTuple")]
pub struct FeedProgress {
    pub items: Vec<Value>,
    pub top: Option<String>,
    pub bottom: Option<String>,
}

impl FeedProgress {
    /// Appends a page and moves the cursor window to it
    pub fn append_page(&mut self, page: FeedPage) {
        self.items.extend(page.items);
        self.top = page.top;
        self.bottom = page.bottom;
    }

    /// Returns true if a persisted crawl had already reached the end
    pub fn is_exhausted(&self) -> bool {
        self.top == self.bottom
    }
}

impl From<FeedTuple> for FeedProgress {
    fn from((items, top, bottom): FeedTuple) -> Self {
        Self { items, top, bottom }
    }
}

impl From<FeedProgress> for FeedTuple {
    fn from(progress: FeedProgress) -> Self {
        (progress.items, progress.top, progress.bottom)
    }
}

/// Reads the numeric id of a feed item
///
/// Accepts `id` as a number or numeric string, falling back to `id_str`.
pub fn item_id(item: &Value) -> Option<u64> {
    let parse = |v: &Value| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    item.get("id")
        .and_then(parse)
        .or_else(|| item.get("id_str").and_then(parse))
}

/// The `max_id` for the next legacy page: one below the smallest id seen
///
/// Returns `None` when no item carries an id, i.e. the crawl has not started.
pub fn next_max_id(items: &[Value]) -> Option<u64> {
    items
        .iter()
        .filter_map(item_id)
        .min()
        .map(|min| min.saturating_sub(1))
}
