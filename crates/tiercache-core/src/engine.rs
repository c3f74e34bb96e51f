//! The cache engine

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tiercache_proxy::{FetchRequest, Fetcher};
use tiercache_storage::BlobStore;
use tracing::{debug, info, warn};

use crate::cache::{
    self, BudgetReport, CacheCounters, EntryStore, StrategyContext, aggregate_size,
    fetch_network, persist_response,
};
use crate::classifier::{GlobPattern, TierClassifier};
use crate::config::{EngineConfig, TierConfig};
use crate::control::{ControlCommand, ControlReply, EngineStats};
use crate::error::CoreError;
use crate::favorability::{Favorability, FavorabilitySource};
use crate::key::CacheKey;
use crate::maintenance::run_maintenance;
use crate::response::CachedResponse;
use crate::tasks::TaskQueue;
use crate::usage::{PATTERN_REGION, Prediction, UsageTracker, prefetch_candidates};

/// Owns every tier store, the usage graph and the background task queue
///
/// Cloning is cheap and yields a handle to the same engine.
#[derive(Clone)]
pub struct CacheEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    classifier: TierClassifier,
    store: Arc<EntryStore>,
    fetcher: Arc<dyn Fetcher>,
    favorability: Arc<dyn FavorabilitySource>,
    tracker: UsageTracker,
    tasks: TaskQueue,
    counters: Arc<CacheCounters>,
    last_maintenance_at: RwLock<Option<DateTime<Utc>>>,
}

impl CacheEngine {
    /// Validate the configuration, open every tier region and load the
    /// persisted usage graph
    ///
    /// A persisted graph that cannot be read is discarded and the engine
    /// starts with an empty one.
    pub async fn new(
        config: EngineConfig,
        blobs: Arc<dyn BlobStore>,
        fetcher: Arc<dyn Fetcher>,
        favorability: Arc<dyn FavorabilitySource>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let store = Arc::new(EntryStore::new(blobs));
        for tier in &config.tiers {
            store.open(&tier.name).await?;
        }
        store.open(PATTERN_REGION).await?;

        let tracker = UsageTracker::new(
            config.recent_access_capacity,
            Duration::from_secs(config.transition_window_secs),
        );
        match tracker.load(store.blobs().as_ref()).await {
            Ok(true) => info!(
                "Loaded usage patterns for {} keys",
                tracker.patterns_learned()
            ),
            Ok(false) => debug!("No persisted usage patterns found"),
            Err(e) => warn!("Discarding unreadable usage patterns: {}", e),
        }

        let classifier =
            TierClassifier::new(&config.rules, &config.default_tier, config.origin.clone());

        info!(
            "Cache engine initialized: {} tiers, budget {} bytes",
            config.tiers.len(),
            config.max_size
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                classifier,
                store,
                fetcher,
                favorability,
                tracker,
                tasks: TaskQueue::new(),
                counters: Arc::new(CacheCounters::default()),
                last_maintenance_at: RwLock::new(None),
            }),
        })
    }

    /// Resolve a request through its tier's strategy
    ///
    /// Never fails: the worst outcome is a synthesized unavailable or
    /// not-found response. Requests that are not cacheable are forwarded to
    /// the fetcher untouched.
    pub async fn handle(&self, request: &FetchRequest) -> CachedResponse {
        let inner = &self.inner;

        let tier = match inner.classify_tier(request) {
            Ok(tier) => tier,
            Err(e) => {
                debug!("Passing through {} {}: {}", request.method, request.url, e);
                return self.passthrough(request).await;
            }
        };

        let key = CacheKey::from_request(request);
        let ctx = StrategyContext {
            request,
            key: &key,
            tier,
            tiers: &inner.config.tiers,
            store: &inner.store,
            fetcher: &inner.fetcher,
            favorability: inner.favorability.favorability(),
            tasks: &inner.tasks,
            counters: &inner.counters,
        };
        let response = tier.strategy.execute(&ctx).await;

        debug!(
            "{} resolved by {} in tier {} ({})",
            key,
            tier.strategy.as_str(),
            tier.name,
            response.source.as_str()
        );
        metrics::counter!(
            "tiercache_requests_total",
            "tier" => tier.name.clone(),
            "source" => response.source.as_str()
        )
        .increment(1);

        self.record_access(&key);
        self.trigger_prefetch(&key);

        response
    }

    async fn passthrough(&self, request: &FetchRequest) -> CachedResponse {
        match fetch_network(&self.inner.fetcher, &self.inner.counters, request).await {
            Ok(response) => CachedResponse::passthrough(response),
            Err(e) => {
                warn!("Passthrough fetch of {} failed: {}", request.url, e);
                CachedResponse::unavailable()
            }
        }
    }

    /// Name of the tier a request belongs to
    pub fn classify(&self, request: &FetchRequest) -> Result<&str, CoreError> {
        self.inner.classifier.classify(request)
    }

    pub fn record_access(&self, key: &CacheKey) {
        self.inner.tracker.record_access(key, Utc::now());
    }

    pub fn predict(&self, key: &CacheKey) -> Vec<Prediction> {
        self.inner.tracker.predict(key)
    }

    /// Schedule background fetches for the likely successors of `key`
    ///
    /// Only runs while favorability is high. Returns the number of prefetches
    /// scheduled; their outcome is never reported.
    pub fn trigger_prefetch(&self, key: &CacheKey) -> usize {
        let favorability = self.inner.favorability.favorability();
        if !favorability.allows_prefetch() {
            return 0;
        }

        let candidates = prefetch_candidates(
            self.inner.tracker.predict(key),
            self.inner.config.prefetch_threshold,
        );
        for candidate in &candidates {
            let inner = self.inner.clone();
            let candidate = candidate.clone();
            self.inner.tasks.submit("prefetch", async move {
                inner.prefetch(&candidate).await;
            });
        }

        if !candidates.is_empty() {
            debug!("Scheduled {} prefetches after {}", candidates.len(), key);
        }
        candidates.len()
    }

    /// Delete every entry in every tier whose key matches `pattern`
    ///
    /// A pattern containing `*` is a glob over the whole key; anything else
    /// is a substring match. Returns the number of entries removed.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let matcher = KeyMatcher::new(pattern);
        let store = &self.inner.store;
        let mut removed = 0u64;

        for tier in &self.inner.config.tiers {
            let keys = match store.keys(&tier.name).await {
                Ok(keys) => keys,
                Err(e) => {
                    warn!("Failed to list tier {} for invalidation: {}", tier.name, e);
                    continue;
                }
            };

            for key in keys.iter().filter(|k| matcher.matches(k.as_str())) {
                match store.delete(&tier.name, key).await {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => warn!("Failed to invalidate {}: {}", key, e),
                }
            }
        }

        info!("Invalidated {} entries matching '{}'", removed, pattern);
        removed
    }

    /// Sweep expired entries if the aggregate size exceeds the budget
    pub async fn enforce_global_budget(&self) -> Result<BudgetReport, CoreError> {
        cache::enforce_global_budget(
            &self.inner.store,
            &self.inner.config.tiers,
            self.inner.config.max_size,
            Utc::now(),
        )
        .await
    }

    pub async fn total_size(&self) -> Result<u64, CoreError> {
        aggregate_size(&self.inner.store, &self.inner.config.tiers).await
    }

    pub async fn stats(&self) -> EngineStats {
        let total_size = self.total_size().await.unwrap_or_else(|e| {
            warn!("Failed to compute cache size: {}", e);
            0
        });
        let counters = &self.inner.counters;

        EngineStats {
            tier_count: self.inner.config.tiers.len(),
            favorability: self.favorability(),
            patterns_learned: self.patterns_learned(),
            last_maintenance_at: self.last_maintenance_at(),
            hits: counters.hits(),
            misses: counters.misses(),
            network_fetches: counters.network_fetches(),
            network_failures: counters.network_failures(),
            total_size,
        }
    }

    pub async fn control(&self, command: ControlCommand) -> ControlReply {
        match command {
            ControlCommand::GetStats => ControlReply::Stats(self.stats().await),
            ControlCommand::Invalidate { pattern } => ControlReply::Invalidated {
                invalidated_count: self.invalidate(&pattern).await,
            },
            ControlCommand::ForceMaintenance => {
                info!("Maintenance requested via control channel");
                let engine = self.clone();
                self.inner.tasks.submit("maintenance", async move {
                    run_maintenance(&engine).await;
                });
                ControlReply::Ack
            }
            ControlCommand::ResetPatterns => ControlReply::PatternsReset {
                patterns_cleared: self.reset_patterns().await,
            },
        }
    }

    /// Drop the learned usage graph and the recent-access log
    ///
    /// The empty graph is persisted right away so a restart does not bring
    /// the old one back. Returns the number of source keys forgotten.
    pub async fn reset_patterns(&self) -> usize {
        let cleared = self.patterns_learned();
        self.inner.tracker.reset();
        info!("Reset usage patterns for {} keys", cleared);

        if let Err(e) = self.save_patterns().await {
            warn!("Failed to persist reset usage patterns: {}", e);
        }
        cleared
    }

    /// Persist the usage graph, returning the number of keys written
    pub async fn save_patterns(&self) -> Result<usize, CoreError> {
        self.inner
            .tracker
            .persist(self.inner.store.blobs().as_ref())
            .await
    }

    /// Wait for all background revalidation, prefetch and maintenance work
    pub async fn flush_background(&self) {
        self.inner.tasks.flush().await;
    }

    pub fn store(&self) -> &Arc<EntryStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn tracker(&self) -> &UsageTracker {
        &self.inner.tracker
    }

    pub fn favorability(&self) -> Favorability {
        self.inner.favorability.favorability()
    }

    pub fn patterns_learned(&self) -> usize {
        self.inner.tracker.patterns_learned()
    }

    pub fn last_maintenance_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_maintenance_at.read()
    }

    pub(crate) fn mark_maintenance(&self, at: DateTime<Utc>) {
        *self.inner.last_maintenance_at.write() = Some(at);
    }
}

impl EngineInner {
    fn classify_tier(&self, request: &FetchRequest) -> Result<&TierConfig, CoreError> {
        let name = self.classifier.classify(request)?;
        self.config
            .tier(name)
            .ok_or_else(|| CoreError::InvalidConfig(format!("unknown tier '{}'", name)))
    }

    /// Fetch a predicted key and store it in its own tier
    async fn prefetch(&self, key: &CacheKey) {
        let Some(request) = key.to_request() else {
            return;
        };
        let tier = match self.classify_tier(&request) {
            Ok(tier) => tier,
            Err(e) => {
                debug!("Not prefetching {}: {}", key, e);
                return;
            }
        };
        if !tier.strategy.persists() {
            return;
        }

        match fetch_network(&self.fetcher, &self.counters, &request).await {
            Ok(response) => {
                if persist_response(&self.store, tier, key, &response).await {
                    debug!("Prefetched {} into tier {}", key, tier.name);
                }
            }
            Err(e) => warn!("Prefetch of {} failed: {}", key, e),
        }
    }
}

enum KeyMatcher {
    Substring(String),
    Glob(GlobPattern),
}

impl KeyMatcher {
    fn new(pattern: &str) -> Self {
        if pattern.contains('*') {
            KeyMatcher::Glob(GlobPattern::compile(pattern))
        } else {
            KeyMatcher::Substring(pattern.to_string())
        }
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            KeyMatcher::Substring(s) => key.contains(s.as_str()),
            KeyMatcher::Glob(glob) => glob.matches(key),
        }
    }
}
