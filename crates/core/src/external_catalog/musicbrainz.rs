//! MusicBrainz API client.
//!
//! Upstream policy requires a User-Agent naming the application plus a
//! contact URL, and at most one request per second. The client self-paces
//! behind an async mutex rather than failing on contention.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::types::{ExternalCatalogError, MetadataProvider, MetadataRelease};

/// MusicBrainz client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicBrainzConfig {
    /// User-Agent string: "AppName/Version ( contact-url )".
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Spacing between requests in milliseconds (default 1100 for 1 req/s).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_user_agent() -> String {
    format!(
        "harmonia/{} ( https://github.com/harmonia-audio/harmonia )",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_rate_limit() -> u64 {
    1100
}

const MB_MAX_LIMIT: u32 = 100;

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            rate_limit_ms: default_rate_limit(),
            base_url: None,
        }
    }
}

/// MusicBrainz recordings client.
pub struct MusicBrainzClient {
    client: Client,
    base_url: String,
    last_request: Arc<Mutex<Option<Instant>>>,
    rate_limit: Duration,
}

impl MusicBrainzClient {
    pub fn new(config: MusicBrainzConfig) -> Result<Self, ExternalCatalogError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| "https://musicbrainz.org/ws/2".to_string());

        Ok(Self {
            client,
            base_url,
            last_request: Arc::new(Mutex::new(None)),
            rate_limit: Duration::from_millis(config.rate_limit_ms),
        })
    }

    /// Block (asynchronously) until the pacing window allows a request.
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.rate_limit {
                let wait = self.rate_limit - elapsed;
                debug!("MusicBrainz rate limit: waiting {:?}", wait);
                sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }

    fn check_status(
        status: reqwest::StatusCode,
        context: &str,
    ) -> Result<(), ExternalCatalogError> {
        if status.as_u16() == 429 {
            warn!("MusicBrainz rate limit exceeded");
            return Err(ExternalCatalogError::RateLimitExceeded);
        }
        if status.as_u16() == 404 {
            return Err(ExternalCatalogError::NotFound(context.to_string()));
        }
        if !status.is_success() {
            return Err(ExternalCatalogError::Api {
                status: status.as_u16(),
                message: context.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataProvider for MusicBrainzClient {
    async fn search_recordings(
        &self,
        query: &str,
        artist: Option<&str>,
        limit: u32,
    ) -> Result<Vec<MetadataRelease>, ExternalCatalogError> {
        self.wait_for_rate_limit().await;

        // Over-fetch to defeat non-deterministic server-side pagination on
        // tied scores, then sort and cut locally. The server caps at 100.
        let fetch_limit = (limit * 5).max(100).min(MB_MAX_LIMIT);

        let lucene = match artist {
            Some(artist) => format!(
                "recording:\"{}\" AND artist:\"{}\"",
                escape_lucene(query),
                escape_lucene(artist)
            ),
            None => format!("recording:\"{}\"", escape_lucene(query)),
        };

        debug!(query = %lucene, limit, "MusicBrainz recording search");

        let url = format!("{}/recording", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", lucene.as_str()),
                ("fmt", "json"),
                ("limit", &fetch_limit.to_string()),
            ])
            .send()
            .await?;

        Self::check_status(response.status(), query)?;

        let body: MbSearchResponse = response
            .json()
            .await
            .map_err(|e| ExternalCatalogError::Parse(e.to_string()))?;

        let mut releases: Vec<MetadataRelease> =
            body.recordings.into_iter().map(Into::into).collect();

        sort_for_determinism(&mut releases);
        releases.truncate(limit as usize);

        Ok(releases)
    }

    async fn recording_by_id(
        &self,
        mbid: &str,
    ) -> Result<Option<MetadataRelease>, ExternalCatalogError> {
        self.wait_for_rate_limit().await;

        let url = format!("{}/recording/{}", self.base_url, mbid);
        let response = self
            .client
            .get(&url)
            .query(&[("inc", "artists+releases"), ("fmt", "json")])
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        Self::check_status(response.status(), mbid)?;

        let recording: MbRecording = response
            .json()
            .await
            .map_err(|e| ExternalCatalogError::Parse(e.to_string()))?;

        let mut release: MetadataRelease = recording.into();
        release.score = 100;
        Ok(Some(release))
    }
}

/// Sort by (score desc, mbid asc) so identical inputs yield identical
/// ordered outputs across calls.
fn sort_for_determinism(releases: &mut [MetadataRelease]) {
    releases.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.mbid.cmp(&b.mbid)));
}

fn escape_lucene(input: &str) -> String {
    input.replace('"', "\\\"")
}

// MusicBrainz API response types (private)

#[derive(Debug, Deserialize)]
struct MbSearchResponse {
    #[serde(default)]
    recordings: Vec<MbRecording>,
}

#[derive(Debug, Deserialize)]
struct MbRecording {
    id: String,
    title: String,
    #[serde(default)]
    score: Option<i32>,
    #[serde(default)]
    length: Option<u64>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MbArtistCredit>,
    #[serde(default)]
    releases: Vec<MbReleaseRef>,
}

#[derive(Debug, Deserialize)]
struct MbArtistCredit {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artist: Option<MbArtist>,
}

#[derive(Debug, Deserialize)]
struct MbArtist {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct MbReleaseRef {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl From<MbRecording> for MetadataRelease {
    fn from(rec: MbRecording) -> Self {
        let artist = rec
            .artist_credit
            .first()
            .map(|ac| {
                ac.name
                    .clone()
                    .or_else(|| ac.artist.as_ref().map(|a| a.name.clone()))
                    .unwrap_or_default()
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "Unknown Artist".to_string());

        let first_release = rec.releases.first();
        let album = first_release.and_then(|r| r.title.clone());
        let year = first_release
            .and_then(|r| r.date.as_deref())
            .filter(|d| d.len() >= 4)
            .and_then(|d| d[..4].parse().ok());

        MetadataRelease {
            mbid: rec.id,
            artist,
            title: rec.title,
            album,
            year,
            duration_ms: rec.length,
            score: rec.score.unwrap_or(0).clamp(0, 100) as u8,
        }
    }
}
