//! Health check endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tiercache_core::Favorability;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tiers: usize,
    pub favorability: Favorability,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    metrics::counter!("tiercache_health_checks_total").increment(1);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        tiers: state.engine.config().tiers.len(),
        favorability: state.engine.favorability(),
    })
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
}
