//! Control channel protocol

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::favorability::Favorability;

/// A command sent by an external caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    GetStats,
    Invalidate { pattern: String },
    ForceMaintenance,
    /// Forget every learned transition
    ResetPatterns,
}

/// Engine statistics reported by `GET_STATS`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub tier_count: usize,
    pub favorability: Favorability,
    pub patterns_learned: usize,
    pub last_maintenance_at: Option<DateTime<Utc>>,
    pub hits: u64,
    pub misses: u64,
    pub network_fetches: u64,
    pub network_failures: u64,
    /// Aggregate stored bytes across all tiers
    pub total_size: u64,
}

/// Reply to a [`ControlCommand`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    Stats(EngineStats),
    Invalidated {
        #[serde(rename = "invalidatedCount")]
        invalidated_count: u64,
    },
    /// Maintenance was scheduled; it runs in the background
    Ack,
    PatternsReset {
        #[serde(rename = "patternsCleared")]
        patterns_cleared: usize,
    },
}
