//! HTML-scraping indexer adapter.
//!
//! Two-stage scrape of a 1337x-style site: fetch the results page, pull up
//! to 20 detail-page links, then fan out to the detail pages for the magnet
//! URI and metadata. Items without a magnet are dropped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::source::{magnet_infohash, sha1_hex, MetadataExtractor, MusicSource, SourceKind};

use super::health::HealthRecord;
use super::types::SourceAdapter;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_DETAIL_PAGES: usize = 20;
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static SIZE_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d,\.]+\s*[KMGT]?B)").unwrap());

/// Adapter scraping a public HTML torrent index.
pub struct ScrapeAdapter {
    name: String,
    base_url: String,
    client: Client,
    health: HealthRecord,
}

/// Fields lifted off one detail page.
#[derive(Debug, Default)]
struct DetailPage {
    magnet: Option<String>,
    title: String,
    seeders: u32,
    leechers: u32,
    size_bytes: u64,
}

impl ScrapeAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: Option<u64>,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("failed to build HTTP client");

        let base_url: String = base_url.into();

        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            health: HealthRecord::new(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
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

    async fn fetch_detail(&self, url: String) -> Option<MusicSource> {
        let html = match self.fetch(&url).await {
            Ok(html) => html,
            Err(e) => {
                debug!(adapter = %self.name, url = %url, error = %e, "Detail fetch failed");
                return None;
            }
        };

        let page = parse_detail_page(&html);
        let magnet = page.magnet?;

        let format = MetadataExtractor::format(&page.title);
        let bitrate = MetadataExtractor::bitrate(&page.title);
        let id = magnet_infohash(&magnet).unwrap_or_else(|| sha1_hex(&magnet));

        Some(
            MusicSource {
                id,
                title: page.title,
                artist: None,
                format,
                kind: SourceKind::Torrent,
                url: magnet.clone(),
                quality_score: 0.0,
                indexer: self.name.clone(),
                magnet_uri: Some(magnet),
                seeders: Some(page.seeders),
                leechers: Some(page.leechers),
                size_bytes: Some(page.size_bytes),
                uploaded_at: Some(Utc::now()),
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
impl SourceAdapter for ScrapeAdapter {
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
        let search_url = format!(
            "{}/search/{}/1/",
            self.base_url,
            urlencoding::encode(query)
        );

        let html = match self.fetch(&search_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(adapter = %self.name, error = %e, "Search page fetch failed");
                self.health.record(false);
                return Vec::new();
            }
        };

        let detail_urls = extract_detail_urls(&html, &self.base_url);
        if detail_urls.is_empty() {
            // A well-formed page with no hits is a successful search.
            self.health.record(true);
            return Vec::new();
        }

        let fetches = detail_urls.into_iter().map(|url| self.fetch_detail(url));
        let results: Vec<MusicSource> = futures::future::join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .collect();

        debug!(adapter = %self.name, results = results.len(), "Scrape search complete");
        self.health.record(true);
        results
    }
}

/// Pull detail-page URLs from the results table, capped at 20.
fn extract_detail_urls(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("table.table-list tbody tr").unwrap();
    let link_selector = Selector::parse("td.coll-1 a").unwrap();

    let mut urls = Vec::new();
    for row in document.select(&row_selector).take(MAX_DETAIL_PAGES) {
        // The first anchor is the category icon; the second is the torrent.
        let links: Vec<_> = row.select(&link_selector).collect();
        if links.len() < 2 {
            continue;
        }
        if let Some(href) = links[1].value().attr("href") {
            urls.push(format!("{}{}", base_url, href));
        }
    }
    urls
}

fn parse_detail_page(html: &str) -> DetailPage {
    let document = Html::parse_document(html);
    let magnet_selector = Selector::parse(r#"a[href^="magnet:"]"#).unwrap();
    let title_selector = Selector::parse("h1").unwrap();
    let list_selector = Selector::parse("li").unwrap();

    let mut page = DetailPage {
        magnet: document
            .select(&magnet_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(String::from),
        title: document
            .select(&title_selector)
            .next()
            .map(|h| h.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        ..Default::default()
    };

    for item in document.select(&list_selector) {
        let text = item.text().collect::<String>();
        let text = text.trim();

        if text.contains("Seeders") {
            if let Some(m) = NUMBER_RE.find(text) {
                page.seeders = m.as_str().parse().unwrap_or(0);
            }
        } else if text.contains("Leechers") {
            if let Some(m) = NUMBER_RE.find(text) {
                page.leechers = m.as_str().parse().unwrap_or(0);
            }
        } else if text.contains("Total size") || text.contains("Size") {
            if let Some(c) = SIZE_TEXT_RE.captures(text) {
                page.size_bytes = MetadataExtractor::parse_size(&c[1]);
            }
        }
    }

    page
}
