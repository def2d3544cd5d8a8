//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FrontierState`: the persisted traversal frontier of a follow-chain walk
//! - `FeedProgress` / `FeedPage`: cursor-window state of a feed crawl
//! - `EndpointState`: per-endpoint request timing for rate scheduling
//! - `AccountRecord`: an account discovered during the walk

mod account;
mod endpoint_state;
mod feed_state;
mod frontier;

// Re-export main types
pub use account::AccountRecord;
pub use endpoint_state::EndpointState;
pub use feed_state::{item_id, next_max_id, FeedPage, FeedProgress};
pub use frontier::{FrontierState, TargetCount};
