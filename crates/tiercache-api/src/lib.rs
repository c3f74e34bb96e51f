//! Tiered Cache REST API
//!
//! This crate provides the Axum-based HTTP API for the cache engine:
//! the proxied fetch endpoint, the control channel, the favorability
//! updater endpoint, health checks and Prometheus metrics.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
