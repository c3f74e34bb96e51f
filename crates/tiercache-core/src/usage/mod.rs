//! Usage pattern tracking and predictive prefetch

mod pattern;
mod prefetch;
mod tracker;

pub use pattern::{PatternNode, Prediction, UsagePattern};
pub use prefetch::prefetch_candidates;
pub use tracker::{AccessRecord, UsageTracker};

/// Blob store region holding the persisted usage graph
pub const PATTERN_REGION: &str = "usage-patterns";
/// Key of the graph inside [`PATTERN_REGION`]
pub const PATTERN_KEY: &str = "graph";
