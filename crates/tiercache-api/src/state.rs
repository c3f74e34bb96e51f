//! Application state

use tiercache_core::{CacheEngine, SharedFavorability};

/// Prometheus recorder handle used to render `/metrics`
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: CacheEngine,
    /// Writable side of the favorability signal the engine reads
    pub favorability: SharedFavorability,
}

impl AppState {
    pub fn new(engine: CacheEngine, favorability: SharedFavorability) -> Self {
        Self {
            engine,
            favorability,
        }
    }
}
