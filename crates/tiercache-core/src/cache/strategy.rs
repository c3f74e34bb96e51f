//! Request-handling strategies

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tiercache_proxy::{FetchRequest, FetchResponse, Fetcher, ProxyError};
use tracing::{debug, warn};

use super::eviction::enforce_tier_limit;
use super::staleness::is_stale;
use super::store::EntryStore;
use crate::config::TierConfig;
use crate::entry::CacheEntry;
use crate::favorability::Favorability;
use crate::key::CacheKey;
use crate::response::CachedResponse;
use crate::tasks::TaskQueue;

/// Error type for parsing a strategy name
#[derive(Debug, Clone)]
pub struct ParseStrategyError(String);

impl fmt::Display for ParseStrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid cache strategy: {}", self.0)
    }
}

impl std::error::Error for ParseStrategyError {}

/// How a tier resolves requests between its store and the network
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Serve from cache when present, refresh stale entries in the background
    CacheFirst,
    /// Prefer the network, fall back to any cached copy
    NetworkFirst,
    /// Serve from cache immediately and refresh in the background
    StaleWhileRevalidate,
    /// Never touch the network
    CacheOnly,
    /// Never touch the store
    NetworkOnly,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::CacheOnly => "cache-only",
            Strategy::NetworkOnly => "network-only",
        }
    }

    /// Whether network results are written to the tier's store
    pub fn persists(&self) -> bool {
        matches!(
            self,
            Strategy::CacheFirst | Strategy::NetworkFirst | Strategy::StaleWhileRevalidate
        )
    }

    pub async fn execute(self, ctx: &StrategyContext<'_>) -> CachedResponse {
        match self {
            Strategy::CacheFirst => cache_first(ctx).await,
            Strategy::NetworkFirst => network_first(ctx).await,
            Strategy::StaleWhileRevalidate => stale_while_revalidate(ctx).await,
            Strategy::CacheOnly => cache_only(ctx).await,
            Strategy::NetworkOnly => network_only(ctx).await,
        }
    }
}

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "cachefirst" => Ok(Strategy::CacheFirst),
            "networkfirst" => Ok(Strategy::NetworkFirst),
            "stalewhilerevalidate" => Ok(Strategy::StaleWhileRevalidate),
            "cacheonly" => Ok(Strategy::CacheOnly),
            "networkonly" => Ok(Strategy::NetworkOnly),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

/// Engine-wide request counters
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    network_fetches: AtomicU64,
    network_failures: AtomicU64,
}

impl CacheCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn network_fetches(&self) -> u64 {
        self.network_fetches.load(Ordering::Relaxed)
    }

    pub fn network_failures(&self) -> u64 {
        self.network_failures.load(Ordering::Relaxed)
    }
}

/// Everything a strategy needs to resolve one request
pub struct StrategyContext<'a> {
    pub request: &'a FetchRequest,
    pub key: &'a CacheKey,
    pub tier: &'a TierConfig,
    /// All tiers, for cross-tier fallback
    pub tiers: &'a [TierConfig],
    pub store: &'a Arc<EntryStore>,
    pub fetcher: &'a Arc<dyn Fetcher>,
    pub favorability: Favorability,
    pub tasks: &'a TaskQueue,
    pub counters: &'a Arc<CacheCounters>,
}

async fn cache_first(ctx: &StrategyContext<'_>) -> CachedResponse {
    if let Some(entry) = ctx.store.lookup(&ctx.tier.name, ctx.key).await {
        ctx.counters.record_hit();
        if is_stale(&entry, ctx.tier, Utc::now()) {
            debug!("Serving stale {} from tier {}", ctx.key, ctx.tier.name);
            schedule_revalidation(ctx);
        }
        return CachedResponse::from_entry(&entry);
    }

    ctx.counters.record_miss();
    match fetch_and_persist(ctx).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Fetch failed for {} with nothing cached: {}", ctx.key, e);
            CachedResponse::unavailable()
        }
    }
}

async fn network_first(ctx: &StrategyContext<'_>) -> CachedResponse {
    let error = match fetch_and_persist(ctx).await {
        Ok(response) => return response,
        Err(e) => e,
    };

    // Classified tier first, then every other tier
    let fallback_tiers =
        std::iter::once(ctx.tier).chain(ctx.tiers.iter().filter(|t| t.name != ctx.tier.name));
    for tier in fallback_tiers {
        if let Some(entry) = ctx.store.lookup(&tier.name, ctx.key).await {
            debug!(
                "Fetch failed for {} ({}), serving copy from tier {}",
                ctx.key, error, tier.name
            );
            ctx.counters.record_hit();
            return CachedResponse::from_entry(&entry);
        }
    }

    ctx.counters.record_miss();
    warn!("Fetch failed for {} with nothing cached: {}", ctx.key, error);
    CachedResponse::unavailable()
}

async fn stale_while_revalidate(ctx: &StrategyContext<'_>) -> CachedResponse {
    if let Some(entry) = ctx.store.lookup(&ctx.tier.name, ctx.key).await {
        ctx.counters.record_hit();
        schedule_revalidation(ctx);
        return CachedResponse::from_entry(&entry);
    }

    ctx.counters.record_miss();
    match fetch_and_persist(ctx).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Fetch failed for {} with nothing cached: {}", ctx.key, e);
            CachedResponse::unavailable()
        }
    }
}

async fn cache_only(ctx: &StrategyContext<'_>) -> CachedResponse {
    match ctx.store.lookup(&ctx.tier.name, ctx.key).await {
        Some(entry) => {
            ctx.counters.record_hit();
            CachedResponse::from_entry(&entry)
        }
        None => {
            ctx.counters.record_miss();
            CachedResponse::not_found()
        }
    }
}

async fn network_only(ctx: &StrategyContext<'_>) -> CachedResponse {
    match fetch_network(ctx.fetcher, ctx.counters, ctx.request).await {
        Ok(response) => CachedResponse::from_network(response),
        Err(e) => {
            warn!("Fetch failed for {}: {}", ctx.key, e);
            CachedResponse::unavailable()
        }
    }
}

async fn fetch_and_persist(ctx: &StrategyContext<'_>) -> Result<CachedResponse, ProxyError> {
    let response = fetch_network(ctx.fetcher, ctx.counters, ctx.request).await?;
    persist_response(ctx.store, ctx.tier, ctx.key, &response).await;
    Ok(CachedResponse::from_network(response))
}

/// Perform one fetch, counting it
pub(crate) async fn fetch_network(
    fetcher: &Arc<dyn Fetcher>,
    counters: &CacheCounters,
    request: &FetchRequest,
) -> Result<FetchResponse, ProxyError> {
    counters.network_fetches.fetch_add(1, Ordering::Relaxed);
    let result = fetcher.fetch(request).await;
    if result.is_err() {
        counters.network_failures.fetch_add(1, Ordering::Relaxed);
    }
    result
}

/// Store a successful response in a persisting tier, evicting first
///
/// Returns whether the entry was written.
pub(crate) async fn persist_response(
    store: &EntryStore,
    tier: &TierConfig,
    key: &CacheKey,
    response: &FetchResponse,
) -> bool {
    if !tier.strategy.persists() || !response.is_success() {
        return false;
    }

    if let Err(e) = enforce_tier_limit(store, tier).await {
        warn!("Failed to enforce entry limit on tier {}: {}", tier.name, e);
    }

    let entry = CacheEntry::from_response(key.clone(), response, Utc::now());
    store.store(&tier.name, &entry).await
}

/// Refetch in the background; the result is only ever stored
fn schedule_revalidation(ctx: &StrategyContext<'_>) {
    if !ctx.favorability.allows_revalidation() {
        debug!(
            "Skipping revalidation of {} (favorability {})",
            ctx.key,
            ctx.favorability.as_str()
        );
        return;
    }

    let store = ctx.store.clone();
    let fetcher = ctx.fetcher.clone();
    let counters = ctx.counters.clone();
    let tier = ctx.tier.clone();
    let key = ctx.key.clone();
    let request = ctx.request.clone();

    ctx.tasks.submit("revalidate", async move {
        match fetch_network(&fetcher, &counters, &request).await {
            Ok(response) => {
                if persist_response(&store, &tier, &key, &response).await {
                    debug!("Revalidated {} in tier {}", key, tier.name);
                }
            }
            Err(e) => warn!("Background revalidation of {} failed: {}", key, e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strategy() {
        assert_eq!("cache-first".parse::<Strategy>().unwrap(), Strategy::CacheFirst);
        assert_eq!("NetworkFirst".parse::<Strategy>().unwrap(), Strategy::NetworkFirst);
        assert_eq!(
            "stale_while_revalidate".parse::<Strategy>().unwrap(),
            Strategy::StaleWhileRevalidate
        );
        assert!("cache-sometimes".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_as_str_roundtrips() {
        for strategy in [
            Strategy::CacheFirst,
            Strategy::NetworkFirst,
            Strategy::StaleWhileRevalidate,
            Strategy::CacheOnly,
            Strategy::NetworkOnly,
        ] {
            assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Strategy::StaleWhileRevalidate).unwrap();
        assert_eq!(json, "\"stale-while-revalidate\"");
        let parsed: Strategy = serde_json::from_str("\"network-only\"").unwrap();
        assert_eq!(parsed, Strategy::NetworkOnly);
    }

    #[test]
    fn test_persists() {
        assert!(Strategy::CacheFirst.persists());
        assert!(!Strategy::CacheOnly.persists());
        assert!(!Strategy::NetworkOnly.persists());
    }
}
