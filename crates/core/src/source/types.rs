//! Types for the unified music source model.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Kind of backend a result came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Torrent,
    StreamYoutube,
    StreamOther,
    Local,
}

impl SourceKind {
    /// Whether this kind is a streaming source (no peers, no magnet).
    pub fn is_stream(&self) -> bool {
        matches!(self, SourceKind::StreamYoutube | SourceKind::StreamOther)
    }
}

static INFOHASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"xt=urn:btih:([a-fA-F0-9]+)").unwrap());

/// Extract the infohash from a magnet URI, lowercased.
pub fn magnet_infohash(url: &str) -> Option<String> {
    INFOHASH_RE
        .captures(url)
        .map(|c| c[1].to_ascii_lowercase())
}

/// Lowercase hex SHA-1 of the input. Used as a stand-in identity for
/// torrent results whose URL is not a magnet URI.
pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A single search result, normalized across source kinds.
///
/// Torrent-specific and stream-specific fields are optional; the invariants
/// are: torrent results always carry `magnet_uri`, non-torrent results have
/// `seeders = leechers = None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicSource {
    /// Stable identifier (infohash, video id, file path).
    pub id: String,
    /// Display title.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Audio format (FLAC, MP3, OPUS, ...), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "source_type")]
    pub kind: SourceKind,
    /// Resource URL: `magnet:` for torrents, `https:` page for streams.
    pub url: String,
    /// Unified quality score in [0, 1000]; pure function of the other fields.
    pub quality_score: f64,
    /// Which backend produced this result.
    pub indexer: String,

    // Torrent fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Bitrate marker ("320", "V0", "256 kbps", ...). Extracted from titles
    /// for torrents, fixed by the catalog for streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,

    // Stream fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

impl MusicSource {
    /// Dedup identity: infohash for magnet torrents, SHA-1 of the URL for
    /// non-magnet torrent URLs, the upstream id otherwise.
    pub fn identity(&self) -> String {
        if self.kind == SourceKind::Torrent && !self.url.is_empty() {
            if let Some(hash) = magnet_infohash(&self.url) {
                return hash;
            }
            if !self.url.starts_with("magnet:") {
                return sha1_hex(&self.url);
            }
        }
        self.id.clone()
    }

    /// Human-readable size ("1.50 GB", "750.00 MB", "Unknown").
    pub fn size_formatted(&self) -> String {
        let bytes = match self.size_bytes {
            Some(b) if b >= 1024 => b,
            _ => return "Unknown".to_string(),
        };

        let gb = bytes as f64 / (1024u64.pow(3) as f64);
        if gb >= 1.0 {
            return format!("{:.2} GB", gb);
        }

        let mb = bytes as f64 / (1024u64.pow(2) as f64);
        format!("{:.2} MB", mb)
    }

    /// Recompute and store the quality score. Idempotent.
    pub fn scored(mut self) -> Self {
        self.quality_score = super::scoring::quality_score(&self);
        self
    }
}

/// A ranked result with a human explanation and display tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedSource {
    pub rank: u32,
    pub source: MusicSource,
    pub explanation: String,
    pub tags: Vec<String>,
}

#[cfg(test)]
pub(crate) fn torrent_fixture(title: &str, magnet: &str, seeders: u32) -> MusicSource {
    MusicSource {
        id: magnet_infohash(magnet).unwrap_or_else(|| sha1_hex(magnet)),
        title: title.to_string(),
        artist: None,
        format: super::MetadataExtractor::format(title),
        kind: SourceKind::Torrent,
        url: magnet.to_string(),
        quality_score: 0.0,
        indexer: "test".to_string(),
        magnet_uri: Some(magnet.to_string()),
        seeders: Some(seeders),
        leechers: Some(1),
        size_bytes: Some(500 * 1024 * 1024),
        uploaded_at: None,
        bitrate: super::MetadataExtractor::bitrate(title),
        codec: None,
        thumbnail_url: None,
        duration_seconds: None,
    }
    .scored()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infohash_from_magnet() {
        let url = "magnet:?xt=urn:btih:ABC123DEF456&dn=test";
        assert_eq!(magnet_infohash(url), Some("abc123def456".to_string()));
    }

    #[test]
    fn test_infohash_missing() {
        assert_eq!(magnet_infohash("https://example.org/t/1"), None);
    }

    #[test]
    fn test_sha1_hex_stable() {
        let a = sha1_hex("https://example.org/dl/42");
        let b = sha1_hex("https://example.org/dl/42");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identity_prefers_infohash() {
        let source = torrent_fixture("Test", "magnet:?xt=urn:btih:FFAA00&dn=x", 5);
        assert_eq!(source.identity(), "ffaa00");
    }

    #[test]
    fn test_identity_hashes_proxy_urls() {
        let mut source = torrent_fixture("Test", "magnet:?xt=urn:btih:FFAA00", 5);
        source.url = "https://proxy.example/dl/42".to_string();
        assert_eq!(source.identity(), sha1_hex("https://proxy.example/dl/42"));
    }

    #[test]
    fn test_identity_for_streams_is_id() {
        let source = MusicSource {
            id: "dQw4w9WgXcQ".to_string(),
            title: "Test".to_string(),
            artist: None,
            format: Some("OPUS".to_string()),
            kind: SourceKind::StreamYoutube,
            url: "https://music.example/watch?v=dQw4w9WgXcQ".to_string(),
            quality_score: 0.0,
            indexer: "stream".to_string(),
            magnet_uri: None,
            seeders: None,
            leechers: None,
            size_bytes: None,
            uploaded_at: None,
            bitrate: None,
            codec: Some("opus".to_string()),
            thumbnail_url: None,
            duration_seconds: Some(212),
        };
        assert_eq!(source.identity(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_size_formatted() {
        let mut source = torrent_fixture("Test", "magnet:?xt=urn:btih:aa", 1);
        source.size_bytes = Some(2 * 1024 * 1024 * 1024);
        assert_eq!(source.size_formatted(), "2.00 GB");
        source.size_bytes = Some(750 * 1024 * 1024);
        assert_eq!(source.size_formatted(), "750.00 MB");
        source.size_bytes = Some(100);
        assert_eq!(source.size_formatted(), "Unknown");
        source.size_bytes = None;
        assert_eq!(source.size_formatted(), "Unknown");
    }

    #[test]
    fn test_serialization_round_trip_preserves_score() {
        let source = torrent_fixture(
            "Artist - Album [FLAC]",
            "magnet:?xt=urn:btih:abc123",
            20,
        );
        let json = serde_json::to_string(&source).unwrap();
        let parsed: MusicSource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.quality_score, source.quality_score);
        assert_eq!(
            parsed.scored().quality_score,
            source.quality_score,
            "score must be idempotently recomputable"
        );
    }

    #[test]
    fn test_source_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&SourceKind::Torrent).unwrap(),
            "\"torrent\""
        );
        assert_eq!(
            serde_json::to_string(&SourceKind::StreamYoutube).unwrap(),
            "\"stream_youtube\""
        );
        assert!(SourceKind::StreamOther.is_stream());
        assert!(!SourceKind::Local.is_stream());
    }
}
