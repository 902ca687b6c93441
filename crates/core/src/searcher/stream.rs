//! Streaming catalog adapter.
//!
//! Searches a Piped-compatible music API for songs. Search returns sources
//! whose `url` points at the canonical watch page; resolving a playable
//! audio stream URL is a separate, on-demand call keyed by the video id
//! (slow and bot-detection sensitive, so never done at search time).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::source::{MusicSource, SourceKind};

use super::health::HealthRecord;
use super::types::SourceAdapter;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const SEARCH_LIMIT: usize = 20;

// The upstream delivers OPUS at a fixed quality tier.
const STREAM_CODEC: &str = "OPUS";
const STREAM_BITRATE: &str = "256 kbps";

/// Adapter for a Piped-compatible streaming catalog API.
pub struct StreamAdapter {
    name: String,
    api_base: String,
    client: Client,
    health: HealthRecord,
}

impl StreamAdapter {
    pub fn new(
        name: impl Into<String>,
        api_base: impl Into<String>,
        timeout_secs: Option<u64>,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("harmonia/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        let api_base: String = api_base.into();

        Self {
            name: name.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
            health: HealthRecord::new(),
        }
    }

    /// Resolve a video id to a playable audio URL.
    ///
    /// Picks the highest-bitrate audio-only variant. Returns `None` when the
    /// upstream has no audio streams or the request fails.
    pub async fn resolve_stream_url(&self, video_id: &str) -> Option<String> {
        let url = format!("{}/streams/{}", self.api_base, urlencoding::encode(video_id));

        let response = match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(video_id, status = %r.status(), "Stream resolution rejected");
                return None;
            }
            Err(e) => {
                warn!(video_id, error = %e, "Stream resolution failed");
                return None;
            }
        };

        let streams: StreamsResponse = match response.json().await {
            Ok(s) => s,
            Err(e) => {
                warn!(video_id, error = %e, "Stream response unparseable");
                return None;
            }
        };

        streams
            .audio_streams
            .into_iter()
            .filter(|s| !s.url.is_empty())
            .max_by_key(|s| s.bitrate.unwrap_or(0))
            .map(|s| s.url)
    }

    fn convert_item(&self, item: SearchItem) -> Option<MusicSource> {
        let video_id = extract_video_id(&item.url)?;
        let title = item.title?;

        let full_title = match &item.uploader_name {
            Some(artist) => format!("{} - {}", artist, title),
            None => title,
        };

        Some(
            MusicSource {
                id: video_id.clone(),
                title: full_title,
                artist: item.uploader_name,
                format: Some(STREAM_CODEC.to_string()),
                kind: SourceKind::StreamYoutube,
                url: format!("https://music.youtube.com/watch?v={}", video_id),
                quality_score: 0.0,
                indexer: self.name.clone(),
                magnet_uri: None,
                seeders: None,
                leechers: None,
                size_bytes: None,
                uploaded_at: None,
                bitrate: Some(STREAM_BITRATE.to_string()),
                codec: Some(STREAM_CODEC.to_string()),
                thumbnail_url: item.thumbnail,
                duration_seconds: item.duration.filter(|&d| d > 0).map(|d| d as u32),
            }
            .scored(),
        )
    }
}

#[async_trait]
impl SourceAdapter for StreamAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StreamYoutube
    }

    fn health(&self) -> &HealthRecord {
        &self.health
    }

    async fn search(&self, query: &str) -> Vec<MusicSource> {
        let url = format!(
            "{}/search?q={}&filter=music_songs",
            self.api_base,
            urlencoding::encode(query)
        );

        let response = match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(adapter = %self.name, status = %r.status(), "Stream search rejected");
                self.health.record(false);
                return Vec::new();
            }
            Err(e) => {
                warn!(adapter = %self.name, error = %e, "Stream search failed");
                self.health.record(false);
                return Vec::new();
            }
        };

        let body: SearchResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(adapter = %self.name, error = %e, "Stream search response unparseable");
                self.health.record(false);
                return Vec::new();
            }
        };

        let results: Vec<MusicSource> = body
            .items
            .into_iter()
            .take(SEARCH_LIMIT)
            .filter_map(|item| self.convert_item(item))
            .collect();

        debug!(adapter = %self.name, results = results.len(), "Stream search complete");
        self.health.record(true);
        results
    }
}

// Upstream API response types (private)

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader_name: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamsResponse {
    #[serde(default)]
    audio_streams: Vec<AudioStream>,
}

#[derive(Debug, Deserialize)]
struct AudioStream {
    #[serde(default)]
    url: String,
    #[serde(default)]
    bitrate: Option<u32>,
}

/// Pull the video id out of a `/watch?v=<id>` path.
fn extract_video_id(url: &str) -> Option<String> {
    let (_, after) = url.split_once("v=")?;
    let id: String = after
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}
