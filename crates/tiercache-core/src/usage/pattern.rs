//! Transition graph between cache keys

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::key::CacheKey;

/// Outgoing transitions of one key
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternNode {
    /// Sum of all outgoing edge weights
    pub total: u64,
    pub edges: BTreeMap<CacheKey, u64>,
}

/// A predicted follow-up request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Prediction {
    pub key: CacheKey,
    pub probability: f64,
}

/// Directed weighted graph: edge A -> B counts how often B was requested
/// shortly after A
///
/// Weights only grow; [`UsagePattern::reset`] is the only way to shrink the
/// graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct UsagePattern {
    nodes: BTreeMap<CacheKey, PatternNode>,
}

impl UsagePattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&mut self, from: &CacheKey, to: &CacheKey) {
        let node = self.nodes.entry(from.clone()).or_default();
        *node.edges.entry(to.clone()).or_insert(0) += 1;
        node.total += 1;
    }

    pub fn weight(&self, from: &CacheKey, to: &CacheKey) -> u64 {
        self.nodes
            .get(from)
            .and_then(|node| node.edges.get(to))
            .copied()
            .unwrap_or(0)
    }

    /// Outgoing edges of `key`, most probable first
    ///
    /// Equal probabilities are ordered by key so the result is deterministic.
    pub fn predict(&self, key: &CacheKey) -> Vec<Prediction> {
        let Some(node) = self.nodes.get(key) else {
            return Vec::new();
        };
        if node.total == 0 {
            return Vec::new();
        }

        let mut predictions: Vec<Prediction> = node
            .edges
            .iter()
            .map(|(to, weight)| Prediction {
                key: to.clone(),
                probability: *weight as f64 / node.total as f64,
            })
            .collect();

        predictions.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then_with(|| a.key.cmp(&b.key))
        });
        predictions
    }

    /// Number of keys with at least one outgoing transition
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
    }
}
