//! Environmental favorability signal

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Error type for parsing favorability
#[derive(Debug, Clone)]
pub struct ParseFavorabilityError(String);

impl fmt::Display for ParseFavorabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid favorability: {}", self.0)
    }
}

impl std::error::Error for ParseFavorabilityError {}

/// How favorable conditions currently are for non-essential background work
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Favorability {
    Low,
    #[default]
    Medium,
    High,
}

impl Favorability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Favorability::Low => "low",
            Favorability::Medium => "medium",
            Favorability::High => "high",
        }
    }

    /// Background revalidation runs unless conditions are low
    pub fn allows_revalidation(&self) -> bool {
        *self >= Favorability::Medium
    }

    /// Speculative prefetch only runs when conditions are high
    pub fn allows_prefetch(&self) -> bool {
        *self == Favorability::High
    }
}

impl FromStr for Favorability {
    type Err = ParseFavorabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Favorability::Low),
            "medium" => Ok(Favorability::Medium),
            "high" => Ok(Favorability::High),
            _ => Err(ParseFavorabilityError(s.to_string())),
        }
    }
}

/// Read-only view of the favorability signal
pub trait FavorabilitySource: Send + Sync {
    fn favorability(&self) -> Favorability;
}

impl FavorabilitySource for Favorability {
    fn favorability(&self) -> Favorability {
        *self
    }
}

/// Favorability value refreshed by an external updater
#[derive(Clone, Default)]
pub struct SharedFavorability {
    current: Arc<RwLock<Favorability>>,
}

impl SharedFavorability {
    pub fn new(initial: Favorability) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn set(&self, value: Favorability) {
        *self.current.write() = value;
    }
}

impl FavorabilitySource for SharedFavorability {
    fn favorability(&self) -> Favorability {
        *self.current.read()
    }
}
