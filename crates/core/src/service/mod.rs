//! Ranked search service.
//!
//! The lightweight pipeline behind the request/response and streaming
//! transports: parse (SQL-ish or natural language), search the engine,
//! rank, and annotate each result with a human explanation and tags.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::orchestrator::{ProgressSender, SearchOptions};
use crate::query::{convert_to_sql, MusicQuery, QueryType, SqlParser};
use crate::searcher::SearchEngine;
use crate::source::{MusicSource, RankedSource};

const FAST_SEEDERS: u32 = 50;
const POPULAR_SEEDERS: u32 = 100;

/// Outcome of one ranked search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    pub total_found: usize,
    pub search_time_ms: u64,
    pub results: Vec<RankedSource>,
}

/// Parse → engine → rank.
pub struct RankedSearch {
    engine: Arc<SearchEngine>,
}

impl RankedSearch {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<SearchEngine> {
        &self.engine
    }

    pub async fn search(
        &self,
        query: &str,
        format_filter: Option<&str>,
        min_seeders: u32,
        limit: usize,
        progress: Option<ProgressSender>,
    ) -> SearchReport {
        let start = Instant::now();
        let options = SearchOptions {
            progress,
            ..Default::default()
        };

        info!(query, "Search request");
        options.emit(10, "Parsing query");

        let (music_query, sql_query) = self.parse(query);

        // Explicit request parameters override whatever the parser found.
        let format = format_filter
            .map(String::from)
            .or_else(|| music_query.format.clone());
        let min_seeders = min_seeders.max(music_query.min_seeders);
        let limit = if limit > 0 { limit } else { music_query.limit };

        let search_terms = music_query.search_terms(query);
        debug!(terms = %search_terms, min_seeders, "Engine search");
        options.emit(30, "Searching sources");

        let sources = self
            .engine
            .search(&search_terms, format.as_deref(), min_seeders)
            .await;
        let total_found = sources.len();

        options.emit(70, "Ranking results");

        let results: Vec<RankedSource> = sources
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, source)| annotate(source, (i + 1) as u32))
            .collect();

        options.emit(100, "Complete");

        let search_time_ms = start.elapsed().as_millis() as u64;
        info!(
            total_found,
            returned = results.len(),
            search_time_ms,
            "Search complete"
        );

        SearchReport {
            query: query.to_string(),
            sql_query,
            total_found,
            search_time_ms,
            results,
        }
    }

    /// SQL-ish input is parsed directly; anything else goes through the
    /// natural-language rewrite first.
    fn parse(&self, query: &str) -> (MusicQuery, Option<String>) {
        if query.trim_start().to_ascii_uppercase().starts_with("SELECT") {
            if let Some(music_query) = SqlParser::parse(query) {
                return (music_query, Some(query.to_string()));
            }
        }

        let sql = convert_to_sql(query);
        match SqlParser::parse(&sql) {
            Some(music_query) => (music_query, Some(sql)),
            None => (MusicQuery::new(QueryType::Album), None),
        }
    }
}

/// Attach rank, explanation, and tags to one result.
fn annotate(source: MusicSource, rank: u32) -> RankedSource {
    let mut parts = Vec::new();
    if let Some(format) = &source.format {
        parts.push(format.clone());
    }
    if let Some(bitrate) = &source.bitrate {
        parts.push(bitrate.clone());
    }
    if let Some(seeders) = source.seeders {
        parts.push(format!("{} seeders", seeders));
    }
    if source.size_bytes.is_some() {
        parts.push(source.size_formatted());
    }
    let explanation = parts.join(" • ");

    let mut tags = Vec::new();
    if rank == 1 {
        tags.push("best".to_string());
    }
    if source.format.as_deref() == Some("FLAC") {
        tags.push("lossless".to_string());
        let hi_res = source
            .bitrate
            .as_deref()
            .map(|b| b.contains("24") || b.to_ascii_uppercase().contains("DSD"))
            .unwrap_or(false)
            || source.title.to_ascii_uppercase().contains("24BIT")
            || source.title.to_ascii_uppercase().contains("DSD");
        if hi_res {
            tags.push("hi-res".to_string());
        }
    }
    if source.seeders.map(|s| s >= FAST_SEEDERS).unwrap_or(false) {
        tags.push("fast".to_string());
    }
    if source.seeders.map(|s| s >= POPULAR_SEEDERS).unwrap_or(false) {
        tags.push("popular".to_string());
    }
    if source.kind.is_stream() {
        tags.push("stream".to_string());
    }

    RankedSource {
        rank,
        source,
        explanation,
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::SourceAdapter;
    use crate::source::{torrent_fixture, SourceKind};
    use crate::testing::MockAdapter;

    fn service(adapters: Vec<MockAdapter>) -> RankedSearch {
        RankedSearch::new(Arc::new(SearchEngine::new(
            adapters
                .into_iter()
                .map(|a| Arc::new(a) as Arc<dyn SourceAdapter>)
                .collect(),
        )))
    }

    #[tokio::test]
    async fn test_search_ranks_and_annotates() {
        let adapter = MockAdapter::new("a").with_results(vec![
            torrent_fixture("Album [MP3 320]", "magnet:?xt=urn:btih:aa", 60),
            torrent_fixture("Album [FLAC 24bit]", "magnet:?xt=urn:btih:bb", 120),
        ]);
        let service = service(vec![adapter]);

        let report = service.search("radiohead ok computer", None, 1, 50, None).await;

        assert_eq!(report.total_found, 2);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].rank, 1);
        assert_eq!(report.results[1].rank, 2);

        let top = &report.results[0];
        assert_eq!(top.source.format.as_deref(), Some("FLAC"));
        assert!(top.tags.contains(&"best".to_string()));
        assert!(top.tags.contains(&"lossless".to_string()));
        assert!(top.tags.contains(&"hi-res".to_string()));
        assert!(top.tags.contains(&"fast".to_string()));
        assert!(top.tags.contains(&"popular".to_string()));
        assert!(top.explanation.contains("FLAC"));
        assert!(top.explanation.contains("120 seeders"));
    }

    #[tokio::test]
    async fn test_sql_query_passthrough() {
        let adapter = MockAdapter::new("a").with_results(vec![torrent_fixture(
            "Radiohead OK Computer FLAC",
            "magnet:?xt=urn:btih:aa",
            10,
        )]);
        let service = service(vec![adapter]);

        let report = service
            .search(
                r#"SELECT album WHERE artist="Radiohead" AND album="OK Computer""#,
                None,
                1,
                50,
                None,
            )
            .await;

        assert_eq!(
            report.sql_query.as_deref(),
            Some(r#"SELECT album WHERE artist="Radiohead" AND album="OK Computer""#)
        );
        assert_eq!(report.total_found, 1);
    }

    #[tokio::test]
    async fn test_natural_language_generates_sql() {
        let adapter = MockAdapter::new("a");
        let service = service(vec![adapter]);

        let report = service.search("radiohead ok computer", None, 1, 50, None).await;
        let sql = report.sql_query.unwrap();
        assert!(sql.starts_with("SELECT"));
        assert!(sql.contains("Radiohead"));
    }

    #[tokio::test]
    async fn test_limit_applies_after_total() {
        let adapter = MockAdapter::new("a").with_results(vec![
            torrent_fixture("One FLAC", "magnet:?xt=urn:btih:aa", 10),
            torrent_fixture("Two FLAC", "magnet:?xt=urn:btih:bb", 10),
            torrent_fixture("Three FLAC", "magnet:?xt=urn:btih:cc", 10),
        ]);
        let service = service(vec![adapter]);

        let report = service.search("x y z", None, 1, 2, None).await;
        assert_eq!(report.total_found, 3);
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_tag() {
        let mut stream = torrent_fixture("Song", "magnet:?xt=urn:btih:aa", 0);
        stream.kind = SourceKind::StreamYoutube;
        stream.id = "v1".to_string();
        stream.url = "https://music.example/watch?v=v1".to_string();
        stream.seeders = None;
        stream.leechers = None;
        stream.magnet_uri = None;

        let adapter = MockAdapter::new("a").with_results(vec![stream]);
        let service = service(vec![adapter]);

        let report = service.search("song", None, 1, 50, None).await;
        assert!(report.results[0].tags.contains(&"stream".to_string()));
        assert!(!report.results[0].tags.contains(&"fast".to_string()));
    }

    #[tokio::test]
    async fn test_empty_engine_returns_empty_report() {
        let service = service(vec![]);
        let report = service.search("anything at all", None, 1, 50, None).await;
        assert_eq!(report.total_found, 0);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_progress_events_emitted() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let service = service(vec![MockAdapter::new("a")]);

        service.search("query here", None, 1, 50, Some(tx)).await;

        let mut percents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            percents.push(event.percent);
        }
        assert!(percents.contains(&10));
        assert!(percents.contains(&100));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }
}
