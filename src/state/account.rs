//! Account records as returned by the bulk lookup endpoint

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single account discovered while walking the follow graph
///
/// The numeric `id` is the primary key and never changes. The `handle` is a
/// mutable alias: a record stored under its handle goes stale if the account
/// is renamed, while the copy stored under its id stays authoritative.
///
/// Fields the crawler does not interpret are kept in `extra` so the stored
/// JSON preserves everything the remote service returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Immutable numeric account id
    pub id: u64,

    /// Human-readable, mutable account handle
    #[serde(alias = "screen_name")]
    pub handle: String,

    /// Display name
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    /// Profile biography
    #[serde(default, alias = "description", deserialize_with = "null_as_empty")]
    pub bio: String,

    /// Free-form location text
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location: String,

    /// Whether the account's content is restricted to approved followers
    #[serde(default)]
    pub protected: bool,

    /// Number of followers, used as the popularity metric
    #[serde(default, alias = "followers_count")]
    pub follower_count: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountRecord {
    /// Creates a record with only the fields the crawler interprets
    pub fn new(id: u64, handle: impl Into<String>) -> Self {
        Self {
            id,
            handle: handle.into(),
            name: String::new(),
            bio: String::new(),
            location: String::new(),
            protected: false,
            follower_count: 0,
            extra: Map::new(),
        }
    }

    /// The text the relevance filter inspects
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.name, self.bio, self.location, self.handle
        )
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
