//! Traversal state for the follow-chain walk

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How many accounts the walk should download before it stops
///
/// Persisted as a JSON number, or as the string `"infinity"` for a walk that
/// runs until it is stopped externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TargetRepr", into = "TargetRepr")]
pub enum TargetCount {
    Finite(u64),
    Infinite,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    Count(u64),
    Word(String),
}

impl TargetCount {
    /// Returns true once `downloaded` satisfies the target
    pub fn is_reached(&self, downloaded: usize) -> bool {
        match self {
            Self::Finite(n) => downloaded as u64 >= *n,
            Self::Infinite => false,
        }
    }
}

impl Default for TargetCount {
    fn default() -> Self {
        Self::Infinite
    }
}

impl fmt::Display for TargetCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(n) => write!(f, "{}", n),
            Self::Infinite => write!(f, "infinity"),
        }
    }
}

impl FromStr for TargetCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if matches!(trimmed.to_ascii_lowercase().as_str(), "infinity" | "inf") {
            return Ok(Self::Infinite);
        }
        trimmed
            .parse::<u64>()
            .map(Self::Finite)
            .map_err(|_| format!("expected a count or \"infinity\", got '{}'", s))
    }
}

impl TryFrom<TargetRepr> for TargetCount {
    type Error = String;

    fn try_from(repr: TargetRepr) -> Result<Self, Self::Error> {
        match repr {
            TargetRepr::Count(n) => Ok(Self::Finite(n)),
            TargetRepr::Word(word) => word.parse(),
        }
    }
}

impl From<TargetCount> for TargetRepr {
    fn from(target: TargetCount) -> Self {
        match target {
            TargetCount::Finite(n) => Self::Count(n),
            TargetCount::Infinite => Self::Word("infinity".to_string()),
        }
    }
}

/// Persisted frontier of the follow-chain walk
///
/// The set of downloaded account ids is deliberately absent: it is rebuilt
/// from the record files on disk, which are the source of truth for it.
///
/// Invariant: `done_set` and `current_set` never share a handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierState {
    /// Handles whose neighbors have been fully processed
    pub done_set: BTreeSet<String>,

    /// Handles queued for the current traversal level
    pub current_set: BTreeSet<String>,

    /// Handles queued for the next traversal level
    pub next_set: BTreeSet<String>,

    /// Download target
    pub n: TargetCount,
}

impl FrontierState {
    /// Creates the state for a fresh walk starting at `seed`
    pub fn seeded(seed: impl Into<String>, n: TargetCount) -> Self {
        Self {
            done_set: BTreeSet::new(),
            current_set: BTreeSet::from([seed.into()]),
            next_set: BTreeSet::new(),
            n,
        }
    }

    /// Checks the structural invariants of a loaded state
    pub fn check_invariants(&self) -> Result<(), String> {
        let overlap: Vec<&String> = self.done_set.intersection(&self.current_set).collect();
        if overlap.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "{} handle(s) are both done and queued: {:?}",
                overlap.len(),
                overlap
            ))
        }
    }

    /// Takes the next handle to expand from the current level
    pub fn pop_current(&mut self) -> Option<String> {
        self.current_set.pop_first()
    }

    /// Puts a handle back into the current level unchanged
    pub fn requeue(&mut self, handle: String) {
        self.current_set.insert(handle);
    }

    /// Queues handles for the next level, skipping any already done
    ///
    /// Returns how many handles were newly queued.
    pub fn enqueue_next<I>(&mut self, handles: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for handle in handles {
            if !self.done_set.contains(&handle) && self.next_set.insert(handle) {
                added += 1;
            }
        }
        added
    }

    /// Records a handle as fully processed
    pub fn mark_done(&mut self, handle: String) {
        self.current_set.remove(&handle);
        self.next_set.remove(&handle);
        self.done_set.insert(handle);
    }

    /// Advances to the next traversal level once the current one is drained
    ///
    /// Returns true if a level advance happened.
    pub fn advance_if_drained(&mut self) -> bool {
        if !self.current_set.is_empty() || self.next_set.is_empty() {
            return false;
        }

        let next = std::mem::take(&mut self.next_set);
        self.current_set = next
            .into_iter()
            .filter(|handle| !self.done_set.contains(handle))
            .collect();
        true
    }

    /// Returns true when no handle is queued at any level
    pub fn is_exhausted(&self) -> bool {
        self.current_set.is_empty() && self.next_set.is_empty()
    }
}
