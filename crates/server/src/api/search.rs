//! Search and stream-resolution handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use harmonia_core::{MusicSource, RankedSource, SearchReport, SourceKind};

use crate::metrics::{RESOLVE_REQUESTS_TOTAL, SEARCH_EMPTY_TOTAL, SEARCH_REQUESTS_TOTAL};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub format_filter: Option<String>,
    #[serde(default = "default_min_seeders")]
    pub min_seeders: u32,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_min_seeders() -> u32 {
    1
}

fn default_limit() -> usize {
    50
}

/// Wire shape of one source, with the legacy `magnet_link` alias and the
/// preformatted size the front ends expect.
#[derive(Debug, Clone, Serialize)]
pub struct SourceWire {
    pub id: String,
    pub title: String,
    pub url: String,
    pub source_type: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub quality_score: f64,
    pub indexer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnet_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

impl From<&MusicSource> for SourceWire {
    fn from(source: &MusicSource) -> Self {
        Self {
            id: source.id.clone(),
            title: source.title.clone(),
            url: source.url.clone(),
            source_type: source.kind,
            format: source.format.clone(),
            quality_score: source.quality_score,
            indexer: source.indexer.clone(),
            magnet_link: source.magnet_uri.clone(),
            size_bytes: source.size_bytes,
            size_formatted: source.size_bytes.map(|_| source.size_formatted()),
            seeders: source.seeders,
            leechers: source.leechers,
            codec: source.codec.clone(),
            bitrate: source.bitrate.clone(),
            thumbnail_url: source.thumbnail_url.clone(),
            duration_seconds: source.duration_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedSourceWire {
    pub rank: u32,
    pub source: SourceWire,
    pub explanation: String,
    pub tags: Vec<String>,
}

impl From<&RankedSource> for RankedSourceWire {
    fn from(ranked: &RankedSource) -> Self {
        Self {
            rank: ranked.rank,
            source: SourceWire::from(&ranked.source),
            explanation: ranked.explanation.clone(),
            tags: ranked.tags.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponseWire {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    pub total_found: usize,
    pub search_time_ms: u64,
    pub results: Vec<RankedSourceWire>,
}

impl From<&SearchReport> for SearchResponseWire {
    fn from(report: &SearchReport) -> Self {
        Self {
            query: report.query.clone(),
            sql_query: report.sql_query.clone(),
            total_found: report.total_found,
            search_time_ms: report.search_time_ms,
            results: report.results.iter().map(RankedSourceWire::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub video_id: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<SearchResponseWire>, impl IntoResponse> {
    if body.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Query is required".to_string(),
            }),
        ));
    }

    SEARCH_REQUESTS_TOTAL.with_label_values(&["http"]).inc();
    info!(query = %body.query, "Search request");

    let report = state
        .search()
        .search(
            &body.query,
            body.format_filter.as_deref(),
            body.min_seeders,
            body.limit,
            None,
        )
        .await;

    if report.total_found == 0 {
        SEARCH_EMPTY_TOTAL.inc();
    }

    Ok(Json(SearchResponseWire::from(&report)))
}

/// POST /resolve
///
/// On-demand resolution of a stream id to a playable URL. Called when the
/// user presses play, never during search.
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveRequest>,
) -> Json<ResolveResponse> {
    let adapter = match state.stream() {
        Some(adapter) => adapter,
        None => {
            RESOLVE_REQUESTS_TOTAL
                .with_label_values(&["unconfigured"])
                .inc();
            return Json(ResolveResponse {
                video_id: body.video_id,
                stream_url: None,
                success: false,
                error: Some("Stream source not configured".to_string()),
            });
        }
    };

    info!(video_id = %body.video_id, "Resolving stream URL");

    match adapter.resolve_stream_url(&body.video_id).await {
        Some(url) => {
            RESOLVE_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
            Json(ResolveResponse {
                video_id: body.video_id,
                stream_url: Some(url),
                success: true,
                error: None,
            })
        }
        None => {
            warn!(video_id = %body.video_id, "Stream URL resolution failed");
            RESOLVE_REQUESTS_TOTAL.with_label_values(&["failed"]).inc();
            Json(ResolveResponse {
                video_id: body.video_id,
                stream_url: None,
                success: false,
                error: Some("Failed to resolve stream URL".to_string()),
            })
        }
    }
}
