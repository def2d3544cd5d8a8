//! Relevance filter over discovered accounts
//!
//! The filter is a pure function of its keyword set and the record, so a
//! resumed walk reproduces the decisions of an uninterrupted one.

use crate::state::AccountRecord;

const DEFAULT_KEYWORDS: &[&str] = &[
    "⚧", "🌈", "mtf", "ftm", "mtx", "ftx", "nonbi", "trans ", "transgender", "transmasc",
    "transfem", "药娘", "飞天猫", "🍥", "含糖", "无糖", "家长党", "hrt", "they/them",
    "she/they", "he/they",
];

/// The keyword set used when the configuration does not name one
pub fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

/// Lowercases and replaces ASCII punctuation with spaces
///
/// A trailing space is appended so that a keyword ending in a space (or in
/// punctuation) also matches at the very end of the text.
fn normalize_text(text: &str) -> String {
    let mut normalized = normalize(text);
    normalized.push(' ');
    normalized
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
        .collect()
}

/// Case-insensitive keyword classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPredicate {
    keywords: Vec<String>,
}

impl FilterPredicate {
    /// Builds a predicate; keywords are normalized the same way as the text
    /// they are matched against, so `"they/them"` matches "They/Them".
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| normalize(k.as_ref()))
            .filter(|k| !k.trim().is_empty())
            .collect();
        Self { keywords }
    }

    /// Returns true if any keyword occurs in `text`
    pub fn matches_text(&self, text: &str) -> bool {
        let normalized = normalize_text(text);
        self.keywords.iter().any(|k| normalized.contains(k.as_str()))
    }

    /// Returns true if the record's name, bio, location or handle match
    pub fn matches(&self, record: &AccountRecord) -> bool {
        self.matches_text(&record.searchable_text())
    }
}

impl Default for FilterPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}
