//! `GET /registry/stats` — capability-index and manifest-cache snapshot
//! (SPEC_FULL §12 supplementary operation).

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use std::collections::HashMap;

use crate::state::AppState;

#[derive(Serialize)]
pub struct RegistryStatsResponse {
    #[serde(rename = "totalServices")]
    total_services: usize,
    #[serde(rename = "enabledServices")]
    enabled_services: usize,
    #[serde(rename = "healthyServices")]
    healthy_services: usize,
    #[serde(rename = "cachedManifests")]
    cached_manifests: usize,
    #[serde(rename = "indexedTerms")]
    indexed_terms: HashMap<String, usize>,
}

pub async fn registry_stats(State(state): State<AppState>) -> Json<RegistryStatsResponse> {
    let stats = state.registry.get_stats();
    Json(RegistryStatsResponse {
        total_services: stats.total_services,
        enabled_services: stats.enabled_services,
        healthy_services: stats.healthy_services,
        cached_manifests: stats.cached_manifests,
        indexed_terms: stats.indexed_terms,
    })
}
