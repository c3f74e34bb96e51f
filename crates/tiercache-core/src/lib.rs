//! Tiered Cache Core Engine
//!
//! This crate provides the cache engine: request classification into tiers,
//! per-tier strategies, eviction, usage pattern learning with predictive
//! prefetch, and periodic maintenance.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod control;
pub mod engine;
pub mod entry;
pub mod error;
pub mod favorability;
pub mod key;
pub mod maintenance;
pub mod response;
pub mod tasks;
pub mod usage;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{BudgetReport, EntryStore, Strategy};
pub use classifier::{RuleConfig, RuleKind, TierClassifier};
pub use config::{
    API_TIER, DYNAMIC_TIER, EngineConfig, STATIC_TIER, TierConfig, default_rules, default_tiers,
};
pub use control::{ControlCommand, ControlReply, EngineStats};
pub use engine::CacheEngine;
pub use entry::CacheEntry;
pub use error::CoreError;
pub use favorability::{Favorability, FavorabilitySource, SharedFavorability};
pub use key::CacheKey;
pub use maintenance::{MaintenanceReport, run_maintenance, spawn_maintenance_task};
pub use response::{CACHE_STATUS_HEADER, CachedResponse, ResponseSource};
pub use tasks::TaskQueue;
pub use usage::{Prediction, UsagePattern, UsageTracker};
