//! Periodic maintenance: expiry sweep, budget check, pattern persistence

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{BudgetReport, sweep_expired};
use crate::engine::CacheEngine;

/// Outcome of one maintenance run
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub expired_removed: u64,
    /// `None` when the aggregate size could not be computed
    pub budget: Option<BudgetReport>,
    /// Number of keys in the persisted graph, `None` if persisting failed
    pub patterns_saved: Option<usize>,
    pub finished_at: DateTime<Utc>,
}

/// Run one maintenance pass
///
/// Failures in any step are logged and do not stop the remaining steps.
pub async fn run_maintenance(engine: &CacheEngine) -> MaintenanceReport {
    let expired_removed =
        sweep_expired(engine.store(), &engine.config().tiers, Utc::now()).await;

    let budget = match engine.enforce_global_budget().await {
        Ok(report) => {
            metrics::gauge!("tiercache_cache_size_bytes").set(report.size_after as f64);
            Some(report)
        }
        Err(e) => {
            warn!("Failed to check cache budget: {}", e);
            None
        }
    };

    let patterns_saved = match engine.save_patterns().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Failed to persist usage patterns: {}", e);
            None
        }
    };

    let finished_at = Utc::now();
    engine.mark_maintenance(finished_at);

    metrics::counter!("tiercache_maintenance_runs_total").increment(1);
    metrics::gauge!("tiercache_patterns_learned").set(engine.patterns_learned() as f64);

    info!(
        "Maintenance complete: {} expired removed, size {} bytes, {} patterns saved",
        expired_removed
            + budget.as_ref().map(|b| b.expired_removed).unwrap_or(0),
        budget.as_ref().map(|b| b.size_after).unwrap_or(0),
        patterns_saved.unwrap_or(0)
    );

    MaintenanceReport {
        expired_removed,
        budget,
        patterns_saved,
        finished_at,
    }
}

/// Spawn a background task running [`run_maintenance`] every `interval`
pub fn spawn_maintenance_task(
    engine: CacheEngine,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    use tokio::time::{Duration, MissedTickBehavior};

    let interval = interval.max(Duration::from_secs(1));
    info!(
        "Starting background cache maintenance task (interval: {}s)",
        interval.as_secs()
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first tick (which fires immediately)
        ticker.tick().await;

        loop {
            ticker.tick().await;
            info!("Running scheduled cache maintenance");
            run_maintenance(&engine).await;
        }
    })
}
