//! Cache management module

mod eviction;
mod staleness;
mod store;
mod strategy;

pub use eviction::{
    BudgetReport, aggregate_size, enforce_global_budget, enforce_tier_limit, sweep_expired,
};
pub use staleness::is_stale;
pub use store::EntryStore;
pub use strategy::{CacheCounters, ParseStrategyError, Strategy, StrategyContext};
pub(crate) use strategy::{fetch_network, persist_response};

use crate::error::CoreError;

/// Tier names double as blob store region names
pub fn validate_tier_name(name: &str) -> Result<(), CoreError> {
    tiercache_storage::backend::validate_region(name)?;
    if name == crate::usage::PATTERN_REGION {
        return Err(CoreError::InvalidConfig(format!(
            "tier name '{}' is reserved",
            name
        )));
    }
    Ok(())
}
