//! Keyed search over feed JSON

use serde_json::Value;
use std::collections::HashSet;

const IMAGE_KEY: &str = "media_url_https";
const VIDEO_KEY: &str = "video_info";

/// Collects every value stored under `key` at any depth
///
/// Objects and arrays are searched in document order. A matching value is
/// returned whole and not searched further.
pub fn collect_key_values<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    let mut found = Vec::new();
    collect_into(value, key, &mut found);
    found
}

fn collect_into<'a>(value: &'a Value, key: &str, found: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if k == key {
                    found.push(v);
                } else {
                    collect_into(v, key, found);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_into(item, key, found);
            }
        }
        _ => {}
    }
}

/// Picks the URL of the highest-bitrate variant of a `video_info` object
///
/// A variant without a bitrate counts as bitrate 0.
fn best_variant(video_info: &Value) -> Option<&str> {
    video_info
        .get("variants")?
        .as_array()?
        .iter()
        .filter(|variant| variant.get("url").and_then(Value::as_str).is_some())
        .max_by_key(|variant| {
            variant
                .get("bitrate")
                .and_then(Value::as_u64)
                .unwrap_or(0)
        })?
        .get("url")
        .and_then(Value::as_str)
}

/// Lists the image and video URLs referenced anywhere in a feed
///
/// Images come first, then one URL per video. Duplicates are dropped.
pub fn media_urls(feed: &Value) -> Vec<String> {
    let images = collect_key_values(feed, IMAGE_KEY)
        .into_iter()
        .filter_map(Value::as_str);
    let videos = collect_key_values(feed, VIDEO_KEY)
        .into_iter()
        .filter_map(best_variant);

    let mut seen = HashSet::new();
    images
        .chain(videos)
        .filter(|url| seen.insert(*url))
        .map(str::to_string)
        .collect()
}
