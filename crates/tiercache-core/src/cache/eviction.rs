//! Eviction: per-tier entry ceilings and the global byte budget

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::staleness::is_stale;
use super::store::EntryStore;
use crate::config::TierConfig;
use crate::error::CoreError;

/// Make room for one more write in a tier
///
/// When the tier holds `max_entries` or more, the oldest entries (by
/// insertion order) are deleted until one slot is free. Returns the number
/// of entries removed.
pub async fn enforce_tier_limit(store: &EntryStore, tier: &TierConfig) -> Result<usize, CoreError> {
    let keys = store.keys(&tier.name).await?;
    if keys.len() < tier.max_entries {
        return Ok(0);
    }

    let excess = (keys.len() - tier.max_entries + 1).min(keys.len());
    debug!(
        "Tier {} holds {} entries (limit {}), evicting {}",
        tier.name,
        keys.len(),
        tier.max_entries,
        excess
    );

    let mut removed = 0;
    for key in keys.iter().take(excess) {
        if store.delete(&tier.name, key).await? {
            removed += 1;
        }
    }

    Ok(removed)
}

/// Delete every stale entry in every tier, returning how many were removed
///
/// A tier that fails to sweep is logged and skipped. Entries that cannot be
/// decoded are removed as well.
pub async fn sweep_expired(store: &EntryStore, tiers: &[TierConfig], now: DateTime<Utc>) -> u64 {
    let mut removed = 0u64;

    for tier in tiers {
        let keys = match store.keys(&tier.name).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to list tier {} during sweep: {}", tier.name, e);
                continue;
            }
        };

        for key in keys {
            let expired = match store.get(&tier.name, &key).await {
                Ok(Some(entry)) => is_stale(&entry, tier, now),
                // Vanished since listing
                Ok(None) => false,
                Err(CoreError::Corrupt(reason)) => {
                    warn!("Removing undecodable entry {}: {}", key, reason);
                    true
                }
                Err(e) => {
                    warn!("Failed to read {} during sweep: {}", key, e);
                    false
                }
            };

            if expired {
                match store.delete(&tier.name, &key).await {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => warn!("Failed to delete expired entry {}: {}", key, e),
                }
            }
        }
    }

    if removed > 0 {
        info!("Swept {} expired entries", removed);
    }
    removed
}

/// Total stored bytes across the given tiers
pub async fn aggregate_size(store: &EntryStore, tiers: &[TierConfig]) -> Result<u64, CoreError> {
    let mut total = 0u64;
    for tier in tiers {
        total += store.size(&tier.name).await?;
    }
    Ok(total)
}

/// Outcome of a global budget check
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BudgetReport {
    pub limit: u64,
    pub size_before: u64,
    pub size_after: u64,
    pub exceeded: bool,
    pub expired_removed: u64,
}

/// Advisory global budget enforcement
///
/// When the aggregate size exceeds `limit`, stale entries are swept. Fresh
/// entries are never removed here, so the size may remain above the limit.
pub async fn enforce_global_budget(
    store: &EntryStore,
    tiers: &[TierConfig],
    limit: u64,
    now: DateTime<Utc>,
) -> Result<BudgetReport, CoreError> {
    let size_before = aggregate_size(store, tiers).await?;

    if size_before <= limit {
        return Ok(BudgetReport {
            limit,
            size_before,
            size_after: size_before,
            exceeded: false,
            expired_removed: 0,
        });
    }

    info!(
        "Cache size {} exceeds budget {}, sweeping expired entries",
        size_before, limit
    );

    let expired_removed = sweep_expired(store, tiers, now).await;
    let size_after = aggregate_size(store, tiers).await?;

    if size_after > limit {
        warn!(
            "Cache size {} still exceeds budget {} after sweep",
            size_after, limit
        );
    }

    Ok(BudgetReport {
        limit,
        size_before,
        size_after,
        exceeded: true,
        expired_removed,
    })
}
