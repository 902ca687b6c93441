//! WebSocket search channel with progress streaming.
//!
//! The client sends one JSON request message; the server replies with a
//! stream of `progress` messages terminated by exactly one `result` or
//! `error` message, then closes.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use harmonia_core::{RankedSource, SearchReport};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_MESSAGES_SENT};
use crate::state::AppState;

use super::search::{RankedSourceWire, SourceWire};

#[derive(Debug, Deserialize)]
struct WsSearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    format_filter: Option<String>,
    #[serde(default = "default_min_seeders")]
    min_seeders: u32,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_min_seeders() -> u32 {
    1
}

fn default_limit() -> usize {
    50
}

/// One ranked entry on the WS wire. Carries the source under both `source`
/// and the legacy `torrent` key; consumers treat them as identical.
#[derive(Debug, Serialize)]
struct WsRankedEntry {
    rank: u32,
    source: SourceWire,
    torrent: LegacyTorrentWire,
    explanation: String,
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LegacyTorrentWire {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    magnet_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seeders: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    leechers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bitrate: Option<String>,
    source: String,
    quality_score: f64,
    indexer: String,
}

impl From<&RankedSource> for WsRankedEntry {
    fn from(ranked: &RankedSource) -> Self {
        let wire = RankedSourceWire::from(ranked);
        let source = &ranked.source;
        Self {
            rank: wire.rank,
            torrent: LegacyTorrentWire {
                title: source.title.clone(),
                magnet_link: source.magnet_uri.clone(),
                size_bytes: source.size_bytes,
                size_formatted: source.size_bytes.map(|_| source.size_formatted()),
                seeders: source.seeders,
                leechers: source.leechers,
                format: source.format.clone(),
                bitrate: source.bitrate.clone(),
                source: source.indexer.clone(),
                quality_score: source.quality_score,
                indexer: source.indexer.clone(),
            },
            source: wire.source,
            explanation: wire.explanation,
            tags: wire.tags,
        }
    }
}

fn result_payload(report: &SearchReport) -> serde_json::Value {
    json!({
        "query": report.query,
        "sql_query": report.sql_query,
        "total_found": report.total_found,
        "search_time_ms": report.search_time_ms,
        "results": report.results.iter().map(WsRankedEntry::from).collect::<Vec<_>>(),
    })
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn send_json(socket: &mut WebSocket, message_type: &str, value: serde_json::Value) -> bool {
    WS_MESSAGES_SENT.with_label_values(&[message_type]).inc();
    match serde_json::to_string(&value) {
        Ok(text) => socket.send(Message::Text(text.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize WS message");
            false
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket search client connected");

    let outcome = run_search_session(&mut socket, state).await;
    if let Err(message) = outcome {
        let _ = send_json(&mut socket, "error", json!({"type": "error", "message": message})).await;
    }

    let _ = socket.send(Message::Close(None)).await;
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket search client disconnected");
}

async fn run_search_session(socket: &mut WebSocket, state: Arc<AppState>) -> Result<(), String> {
    // Exactly one request message starts the session.
    let request = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                break serde_json::from_str::<WsSearchRequest>(&text)
                    .map_err(|e| format!("Invalid JSON request: {}", e))?;
            }
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(format!("WebSocket receive error: {}", e)),
        }
    };

    if request.query.trim().is_empty() {
        return Err("Query is required".to_string());
    }

    info!(query = %request.query, "WebSocket search request");

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

    let search_state = Arc::clone(&state);
    let query = request.query.clone();
    let mut search_task = tokio::spawn(async move {
        search_state
            .search()
            .search(
                &query,
                request.format_filter.as_deref(),
                request.min_seeders,
                request.limit,
                Some(progress_tx),
            )
            .await
    });

    // Forward progress until the search completes.
    let report = loop {
        tokio::select! {
            Some(event) = progress_rx.recv() => {
                let payload = json!({
                    "type": "progress",
                    "percent": event.percent,
                    "message": event.message,
                });
                if !send_json(socket, "progress", payload).await {
                    debug!("Client went away mid-search");
                    search_task.abort();
                    return Ok(());
                }
            }
            result = &mut search_task => {
                match result {
                    Ok(report) => break report,
                    Err(e) => return Err(format!("Search failed: {}", e)),
                }
            }
        }
    };

    let payload = json!({"type": "result", "data": result_payload(&report)});
    send_json(socket, "result", payload).await;
    info!(total_found = report.total_found, "WebSocket search complete");
    Ok(())
}
