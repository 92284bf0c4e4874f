//! `GET /health` — liveness probe, no auth required (spec §12).

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    #[serde(rename = "uptimeSeconds")]
    uptime_seconds: u64,
    services: serde_json::Value,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.registry.get_stats();
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.started_at.elapsed().as_secs(),
        services: json!({
            "total": stats.total_services,
            "enabled": stats.enabled_services,
            "healthy": stats.healthy_services,
        }),
    })
}
