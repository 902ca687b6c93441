//! Result fixtures for tests.

use crate::source::{MetadataExtractor, MusicSource, SourceKind};

/// A torrent result with a computed quality score.
pub fn torrent_source(title: &str, infohash: &str, seeders: u32, size_mb: u64) -> MusicSource {
    let magnet = format!("magnet:?xt=urn:btih:{}", infohash);
    MusicSource {
        id: infohash.to_ascii_lowercase(),
        title: title.to_string(),
        artist: None,
        format: MetadataExtractor::format(title),
        kind: SourceKind::Torrent,
        url: magnet.clone(),
        quality_score: 0.0,
        indexer: "mock-indexer".to_string(),
        magnet_uri: Some(magnet),
        seeders: Some(seeders),
        leechers: Some(1),
        size_bytes: Some(size_mb * 1024 * 1024),
        uploaded_at: None,
        bitrate: MetadataExtractor::bitrate(title),
        codec: None,
        thumbnail_url: None,
        duration_seconds: None,
    }
    .scored()
}

/// A stream result with a computed quality score.
pub fn stream_source(title: &str, video_id: &str) -> MusicSource {
    MusicSource {
        id: video_id.to_string(),
        title: title.to_string(),
        artist: None,
        format: Some("OPUS".to_string()),
        kind: SourceKind::StreamYoutube,
        url: format!("https://music.youtube.com/watch?v={}", video_id),
        quality_score: 0.0,
        indexer: "mock-stream".to_string(),
        magnet_uri: None,
        seeders: None,
        leechers: None,
        size_bytes: None,
        uploaded_at: None,
        bitrate: Some("256 kbps".to_string()),
        codec: Some("opus".to_string()),
        thumbnail_url: None,
        duration_seconds: Some(200),
    }
    .scored()
}
