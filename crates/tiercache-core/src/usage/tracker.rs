//! Recent-access log and pattern learning

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tiercache_storage::BlobStore;
use tracing::debug;

use super::pattern::{Prediction, UsagePattern};
use super::{PATTERN_KEY, PATTERN_REGION};
use crate::error::CoreError;
use crate::key::CacheKey;

/// One entry of the recent-access log
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccessRecord {
    pub key: CacheKey,
    pub at: DateTime<Utc>,
}

struct TrackerState {
    recent: VecDeque<AccessRecord>,
    pattern: UsagePattern,
}

/// Learns which keys tend to follow which
///
/// Every access is appended to a bounded log (oldest dropped first) and,
/// when it follows the previous access within the transition window, adds
/// one to the edge from that previous key.
pub struct UsageTracker {
    state: Mutex<TrackerState>,
    capacity: usize,
    window: Duration,
}

impl UsageTracker {
    pub fn new(capacity: usize, window: std::time::Duration) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                recent: VecDeque::with_capacity(capacity),
                pattern: UsagePattern::new(),
            }),
            capacity: capacity.max(1),
            window: Duration::from_std(window).unwrap_or(Duration::MAX),
        }
    }

    pub fn record_access(&self, key: &CacheKey, at: DateTime<Utc>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(previous) = state.recent.back()
            && previous.key != *key
            && at >= previous.at
            && at - previous.at <= self.window
        {
            state.pattern.record_transition(&previous.key, key);
        }

        state.recent.push_back(AccessRecord {
            key: key.clone(),
            at,
        });
        while state.recent.len() > self.capacity {
            state.recent.pop_front();
        }
    }

    pub fn predict(&self, key: &CacheKey) -> Vec<Prediction> {
        self.state.lock().pattern.predict(key)
    }

    /// The recent-access log, oldest first
    pub fn recent(&self) -> Vec<AccessRecord> {
        self.state.lock().recent.iter().cloned().collect()
    }

    pub fn patterns_learned(&self) -> usize {
        self.state.lock().pattern.len()
    }

    pub fn snapshot(&self) -> UsagePattern {
        self.state.lock().pattern.clone()
    }

    /// Replace the learned graph; the access log is left alone
    pub fn restore(&self, pattern: UsagePattern) {
        self.state.lock().pattern = pattern;
    }

    /// Forget everything learned and logged
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.pattern.reset();
        state.recent.clear();
    }

    /// Write the current graph to the pattern region
    pub async fn persist(&self, blobs: &dyn BlobStore) -> Result<usize, CoreError> {
        let pattern = self.snapshot();
        let data = serde_json::to_vec(&pattern)?;
        blobs
            .put(PATTERN_REGION, PATTERN_KEY, Bytes::from(data))
            .await?;
        debug!("Persisted usage patterns for {} keys", pattern.len());
        Ok(pattern.len())
    }

    /// Load a previously persisted graph, returning whether one was found
    pub async fn load(&self, blobs: &dyn BlobStore) -> Result<bool, CoreError> {
        let Some(data) = blobs.get(PATTERN_REGION, PATTERN_KEY).await? else {
            return Ok(false);
        };
        let pattern: UsagePattern = serde_json::from_slice(&data)?;
        self.restore(pattern);
        Ok(true)
    }
}
