//! Types for the metadata service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One canonical recording, as returned by the metadata database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRelease {
    /// Stable opaque identifier, unique per release.
    pub mbid: String,
    pub artist: String,
    /// Recording (song) title.
    pub title: String,
    /// Title of the first release containing this recording.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Search relevance score, 0-100.
    #[serde(default)]
    pub score: u8,
}

impl MetadataRelease {
    /// "3:45"-style duration, "Unknown" when absent.
    pub fn duration_formatted(&self) -> String {
        match self.duration_ms {
            Some(ms) => {
                let seconds = ms / 1000;
                format!("{}:{:02}", seconds / 60, seconds % 60)
            }
            None => "Unknown".to_string(),
        }
    }
}

impl std::fmt::Display for MetadataRelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)?;
        if let Some(album) = &self.album {
            write!(f, " ({})", album)?;
        }
        if let Some(year) = self.year {
            write!(f, " [{}]", year)?;
        }
        Ok(())
    }
}

/// Errors from the metadata service.
#[derive(Debug, Error)]
pub enum ExternalCatalogError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for ExternalCatalogError {
    fn from(e: reqwest::Error) -> Self {
        ExternalCatalogError::Http(e.to_string())
    }
}

/// Read-only contract to the canonical metadata database.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search recordings, optionally narrowed to an artist. The returned
    /// order is deterministic for identical inputs.
    async fn search_recordings(
        &self,
        query: &str,
        artist: Option<&str>,
        limit: u32,
    ) -> Result<Vec<MetadataRelease>, ExternalCatalogError>;

    /// Direct lookup by identifier. `Ok(None)` when the id is unknown.
    async fn recording_by_id(
        &self,
        mbid: &str,
    ) -> Result<Option<MetadataRelease>, ExternalCatalogError>;
}
