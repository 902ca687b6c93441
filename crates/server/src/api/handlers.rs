//! Health and diagnostics handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use harmonia_core::AdapterStatus;

use crate::metrics::encode_metrics;
use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub search_ready: bool,
}

#[derive(Debug, Serialize)]
pub struct IndexersResponse {
    pub active_profile: String,
    pub profiles: Vec<String>,
    pub indexers: Vec<AdapterStatus>,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
        service: "harmonia",
        search_ready: state.search_ready(),
    })
}

/// GET /metrics
pub async fn metrics() -> String {
    encode_metrics()
}

/// GET /indexers
///
/// Adapter health snapshots plus the available profiles.
pub async fn indexers(State(state): State<Arc<AppState>>) -> Json<IndexersResponse> {
    Json(IndexersResponse {
        active_profile: state.active_profile().to_string(),
        profiles: state.profile_names().to_vec(),
        indexers: state.engine().adapter_status(),
    })
}
