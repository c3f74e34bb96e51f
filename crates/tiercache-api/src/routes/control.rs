//! Control channel routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tiercache_core::{ControlCommand, ControlReply, EngineStats, Favorability};
use tracing::info;

use crate::state::AppState;

// ==================== Control Channel ====================

/// POST /api/v1/control
async fn control(
    State(state): State<AppState>,
    Json(command): Json<ControlCommand>,
) -> Json<ControlReply> {
    Json(state.engine.control(command).await)
}

// ==================== REST Shortcuts ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: EngineStats,
    pub total_size_human: String,
    pub hit_rate: f64,
}

/// GET /api/v1/stats
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.engine.stats().await;

    let lookups = stats.hits + stats.misses;
    let hit_rate = if lookups > 0 {
        stats.hits as f64 / lookups as f64
    } else {
        0.0
    };

    Json(StatsResponse {
        total_size_human: format_bytes(stats.total_size),
        hit_rate,
        stats,
    })
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub pattern: String,
}

/// POST /api/v1/invalidate
async fn invalidate(
    State(state): State<AppState>,
    Json(request): Json<InvalidateRequest>,
) -> Json<ControlReply> {
    let reply = state
        .engine
        .control(ControlCommand::Invalidate {
            pattern: request.pattern,
        })
        .await;
    Json(reply)
}

/// POST /api/v1/maintenance
async fn maintenance(State(state): State<AppState>) -> (StatusCode, Json<ControlReply>) {
    let reply = state.engine.control(ControlCommand::ForceMaintenance).await;
    (StatusCode::ACCEPTED, Json(reply))
}

// ==================== Favorability ====================

#[derive(Debug, Serialize, Deserialize)]
pub struct FavorabilityBody {
    pub favorability: Favorability,
}

/// GET /api/v1/favorability
async fn get_favorability(State(state): State<AppState>) -> Json<FavorabilityBody> {
    Json(FavorabilityBody {
        favorability: state.engine.favorability(),
    })
}

/// PUT /api/v1/favorability
async fn set_favorability(
    State(state): State<AppState>,
    Json(body): Json<FavorabilityBody>,
) -> Json<FavorabilityBody> {
    info!("Favorability set to {}", body.favorability.as_str());
    state.favorability.set(body.favorability);
    metrics::gauge!("tiercache_favorability").set(match body.favorability {
        Favorability::Low => 0.0,
        Favorability::Medium => 1.0,
        Favorability::High => 2.0,
    });

    Json(FavorabilityBody {
        favorability: state.engine.favorability(),
    })
}

// ==================== Helper Functions ====================

/// Format bytes as human-readable string
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/control", post(control))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/invalidate", post(invalidate))
        .route("/api/v1/maintenance", post(maintenance))
        .route(
            "/api/v1/favorability",
            get(get_favorability).put(set_favorability),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(50 * 1024 * 1024), "50.00 MB");
    }
}
