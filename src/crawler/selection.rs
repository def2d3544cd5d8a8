//! Next-frontier selection policies
//!
//! The sampled policy is reproducible: each candidate's draw is derived from
//! a SHA-256 of the configured seed, the handle being expanded and the
//! candidate's handle, so a resumed walk picks exactly what an uninterrupted
//! one would have picked.

use crate::config::SelectionConfig;
use crate::state::AccountRecord;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Chooses which accepted neighbors are queued for the next level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// Queue every candidate
    #[default]
    AcceptAll,
    /// Queue `k` candidates, weighted by follower count
    WeightedSample { k: usize, seed: u64 },
}

impl From<&SelectionConfig> for SelectionStrategy {
    fn from(config: &SelectionConfig) -> Self {
        match config {
            SelectionConfig::All => SelectionStrategy::AcceptAll,
            SelectionConfig::Sample { sample_size, seed } => SelectionStrategy::WeightedSample {
                k: *sample_size,
                seed: *seed,
            },
        }
    }
}

impl SelectionStrategy {
    /// Returns the handles to queue, sorted
    pub fn select(&self, expanded: &str, candidates: &[&AccountRecord]) -> Vec<String> {
        let unique: BTreeMap<&str, &AccountRecord> = candidates
            .iter()
            .map(|record| (record.handle.as_str(), *record))
            .collect();

        match *self {
            SelectionStrategy::AcceptAll => unique.keys().map(|h| h.to_string()).collect(),
            SelectionStrategy::WeightedSample { k, .. } if unique.len() <= k => {
                unique.keys().map(|h| h.to_string()).collect()
            }
            SelectionStrategy::WeightedSample { k, seed } => {
                // Efraimidis-Spirakis: keep the k largest ln(u)/w
                let mut keyed: Vec<(f64, &str)> = unique
                    .iter()
                    .map(|(handle, record)| {
                        let weight = record.follower_count as f64 + 1.0;
                        (draw(seed, expanded, handle).ln() / weight, *handle)
                    })
                    .collect();
                keyed.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

                let mut chosen: Vec<String> =
                    keyed.into_iter().take(k).map(|(_, h)| h.to_string()).collect();
                chosen.sort();
                chosen
            }
        }
    }
}

/// Uniform draw in (0, 1) fixed by its inputs
fn draw(seed: u64, expanded: &str, candidate: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(expanded.as_bytes());
    hasher.update([0u8]);
    hasher.update(candidate.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let bits = u64::from_be_bytes(bytes) >> 11;
    (bits as f64 + 0.5) / (1u64 << 53) as f64
}
