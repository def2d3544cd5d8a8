//! Parsing of the cursor-paged timeline response
//!
//! The timeline endpoint answers with a list of instructions. Items and the
//! `Top`/`Bottom` cursors are all entries of the `TimelineAddEntries`
//! instruction; cursor entries are told apart by their `__typename`.

use crate::remote::RemoteError;
use crate::state::FeedPage;
use serde_json::Value;

const ADD_ENTRIES: &str = "TimelineAddEntries";
const CURSOR_TYPENAME: &str = "TimelineTimelineCursor";

/// Extracts items and cursors from a timeline response body
pub fn parse_timeline(body: &Value) -> Result<FeedPage, RemoteError> {
    let instructions = body
        .pointer("/data/user/result/timeline_v2/timeline/instructions")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            RemoteError::Unknown("timeline response has no instructions list".to_string())
        })?;

    let Some(entries) = instructions
        .iter()
        .find(|i| i.get("type").and_then(Value::as_str) == Some(ADD_ENTRIES))
        .and_then(|i| i.get("entries"))
        .and_then(Value::as_array)
    else {
        return Ok(FeedPage::default());
    };

    let mut page = FeedPage::default();
    for content in entries.iter().filter_map(|e| e.get("content")) {
        let typename = content.get("__typename").and_then(Value::as_str);
        if typename != Some(CURSOR_TYPENAME) {
            page.items.push(content.clone());
            continue;
        }

        let value = content
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string);
        match content.get("cursorType").and_then(Value::as_str) {
            Some("Top") => page.top = value,
            Some("Bottom") => page.bottom = value,
            _ => {}
        }
    }

    tracing::debug!(
        "Timeline page: {} items, top={:?}, bottom={:?}",
        page.items.len(),
        page.top,
        page.bottom
    );
    Ok(page)
}
