//! Torznab indexer proxy adapter (Jackett, Prowlarr and compatible).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::source::{magnet_infohash, sha1_hex, MetadataExtractor, MusicSource, SourceKind};

use super::health::HealthRecord;
use super::types::SourceAdapter;

/// Torznab audio categories searched by default:
/// general, MP3, audio/video, audiobook, lossless, other.
pub const DEFAULT_AUDIO_CATEGORIES: [u32; 6] = [3000, 3010, 3020, 3030, 3040, 3050];

const RETRY_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Adapter for a torznab-style indexer proxy.
///
/// Remote (non-localhost) instances get one retry with a short backoff on
/// timeout or non-2xx, which covers the cold-start latency of hosted
/// proxies. Localhost instances fail fast.
pub struct TorznabAdapter {
    name: String,
    base_url: String,
    api_key: String,
    indexer_id: String,
    categories: Vec<u32>,
    client: Client,
    health: HealthRecord,
}

impl TorznabAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        indexer_id: impl Into<String>,
        categories: Option<Vec<u32>>,
        timeout_secs: Option<u64>,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("harmonia/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        let base_url: String = base_url.into();

        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            indexer_id: indexer_id.into(),
            categories: categories.unwrap_or_else(|| DEFAULT_AUDIO_CATEGORIES.to_vec()),
            client,
            health: HealthRecord::new(),
        }
    }

    fn is_remote(&self) -> bool {
        !self.base_url.contains("localhost") && !self.base_url.contains("127.0.0.1")
    }

    fn search_url(&self, query: &str) -> String {
        let categories = self
            .categories
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/api/v2.0/indexers/{}/results/torznab/api?apikey={}&t=search&q={}&cat={}",
            self.base_url,
            urlencoding::encode(&self.indexer_id),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(query),
            categories
        )
    }

    async fn fetch_feed(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        response.text().await.map_err(|e| e.to_string())
    }

    fn convert_item(&self, item: FeedItem) -> Option<MusicSource> {
        // Prefer the magneturl attribute; fall back to <link> only when it
        // is itself a magnet. Proxy download URLs are unusable externally.
        let magnet = match item.attrs.get("magneturl") {
            Some(url) if url.starts_with("magnet:") => url.clone(),
            _ if item.link.starts_with("magnet:") => item.link.clone(),
            _ => return None,
        };

        let seeders = item
            .attrs
            .get("seeders")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0)
            .max(0) as u32;
        let leechers = item
            .attrs
            .get("peers")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0)
            .max(0) as u32;

        let size_bytes = item
            .size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&s| s > 0)
            .or_else(|| item.attrs.get("size").and_then(|s| s.parse::<u64>().ok()))
            .unwrap_or(0);

        let uploaded_at = item
            .pub_date
            .as_deref()
            .and_then(parse_rfc822_date)
            .unwrap_or_else(Utc::now);

        let indexer = item
            .indexer
            .clone()
            .or_else(|| item.attrs.get("indexer").cloned())
            .unwrap_or_else(|| self.name.clone());

        let format = MetadataExtractor::format(&item.title)
            .or_else(|| infer_format_from_category(item.category.as_deref(), &item.title));
        let bitrate = MetadataExtractor::bitrate(&item.title);

        let id = magnet_infohash(&magnet).unwrap_or_else(|| sha1_hex(&magnet));

        Some(
            MusicSource {
                id,
                title: item.title,
                artist: None,
                format,
                kind: SourceKind::Torrent,
                url: magnet.clone(),
                quality_score: 0.0,
                indexer,
                magnet_uri: Some(magnet),
                seeders: Some(seeders),
                leechers: Some(leechers),
                size_bytes: Some(size_bytes),
                uploaded_at: Some(uploaded_at),
                bitrate,
                codec: None,
                thumbnail_url: None,
                duration_seconds: None,
            }
            .scored(),
        )
    }
}

#[async_trait]
impl SourceAdapter for TorznabAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Torrent
    }

    fn health(&self) -> &HealthRecord {
        &self.health
    }

    async fn search(&self, query: &str) -> Vec<MusicSource> {
        if self.api_key.is_empty() {
            return Vec::new();
        }

        let url = self.search_url(query);
        let attempts = if self.is_remote() { 2 } else { 1 };

        for attempt in 1..=attempts {
            match self.fetch_feed(&url).await {
                Ok(xml) => match parse_feed(&xml) {
                    Ok(items) => {
                        let results: Vec<MusicSource> = items
                            .into_iter()
                            .filter_map(|item| self.convert_item(item))
                            .collect();
                        debug!(
                            adapter = %self.name,
                            results = results.len(),
                            "Torznab search complete"
                        );
                        self.health.record(true);
                        return results;
                    }
                    Err(e) => {
                        warn!(adapter = %self.name, error = %e, "Torznab feed unparseable");
                    }
                },
                Err(e) => {
                    warn!(adapter = %self.name, attempt, error = %e, "Torznab request failed");
                }
            }

            if attempt < attempts {
                sleep(RETRY_DELAY).await;
            }
        }

        self.health.record(false);
        Vec::new()
    }
}

/// One `<item>` from the feed, before conversion.
#[derive(Debug, Default)]
struct FeedItem {
    title: String,
    link: String,
    size: Option<String>,
    category: Option<String>,
    pub_date: Option<String>,
    indexer: Option<String>,
    attrs: HashMap<String, String>,
}

/// Parse an RSS-2.0-with-torznab-namespace document into feed items.
fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut current_tag: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    current = Some(FeedItem::default());
                } else if current.is_some() {
                    current_tag = Some(name);
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"attr" {
                    if let Some(item) = current.as_mut() {
                        let mut attr_name = None;
                        let mut attr_value = None;
                        for attribute in e.attributes().flatten() {
                            let value = attribute
                                .unescape_value()
                                .unwrap_or_default()
                                .into_owned();
                            match attribute.key.as_ref() {
                                b"name" => attr_name = Some(value),
                                b"value" => attr_value = Some(value),
                                _ => {}
                            }
                        }
                        if let (Some(name), Some(value)) = (attr_name, attr_value) {
                            item.attrs.insert(name, value);
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(item), Some(tag)) = (current.as_mut(), current_tag.as_deref()) {
                    let text = t.unescape().unwrap_or_default().into_owned();
                    assign_field(item, tag, text);
                }
            }
            Event::CData(t) => {
                if let (Some(item), Some(tag)) = (current.as_mut(), current_tag.as_deref()) {
                    let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    assign_field(item, tag, text);
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                } else {
                    current_tag = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn assign_field(item: &mut FeedItem, tag: &str, text: String) {
    match tag {
        "title" => item.title = text,
        "link" => item.link = text,
        "size" => item.size = Some(text),
        "category" => item.category = Some(text),
        "pubDate" => item.pub_date = Some(text),
        "jackettindexer" => item.indexer = Some(text),
        _ => {}
    }
}

/// Infer the audio format from the torznab category when the title has none.
fn infer_format_from_category(category: Option<&str>, title: &str) -> Option<String> {
    let category: u32 = category?.trim().parse().ok()?;

    match category {
        3040 => Some("FLAC".to_string()),
        3010 => Some("MP3".to_string()),
        3030 => Some("AAC".to_string()),
        3000 | 3050 => {
            let title = title.to_ascii_lowercase();
            if title.contains("flac") || title.contains("24bit") || title.contains("24-bit") {
                Some("FLAC".to_string())
            } else if title.contains("mp3")
                || title.contains("320kbps")
                || title.contains("320k")
                || title.contains("cbr")
            {
                Some("MP3".to_string())
            } else if title.contains("aac") {
                Some("AAC".to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// RFC-822 pubDate, as used in RSS.
fn parse_rfc822_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
