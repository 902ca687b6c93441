//! Workflow implementation.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, info, warn};

use crate::advisor::{
    CandidateSelector, GroupedRelease, LlmClient, QueryUnderstanding, ReleaseGrouper, Selection,
    SelectionPreferences, SessionTracker,
};
use crate::external_catalog::{MetadataProvider, MetadataRelease};
use crate::query::{ParsedQuery, SearchType};
use crate::searcher::SearchEngine;
use crate::source::MusicSource;

use super::types::{
    DiscoveryOutcome, OutcomeCode, SearchOptions, SearchOutcome, SongStrategy,
};

const METADATA_LIMIT: u32 = 20;
const OTHER_ALBUMS_LIMIT: u32 = 30;
const SONG_ONLY_MAX_MB: f64 = 100.0;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());
static BRACKETS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static PARENS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

/// Drives the interactive multi-round search workflow.
pub struct SearchOrchestrator {
    engine: Arc<SearchEngine>,
    metadata: Arc<dyn MetadataProvider>,
    parser: QueryUnderstanding,
    grouper: ReleaseGrouper,
    selector: CandidateSelector,
}

impl SearchOrchestrator {
    pub fn new(
        engine: Arc<SearchEngine>,
        metadata: Arc<dyn MetadataProvider>,
        advisor: Option<Arc<dyn LlmClient>>,
        tracker: Option<Arc<SessionTracker>>,
    ) -> Self {
        let mut parser = QueryUnderstanding::new(advisor.clone());
        let mut grouper = ReleaseGrouper::new(advisor.clone());
        let mut selector = CandidateSelector::new(advisor);
        if let Some(tracker) = tracker {
            parser = parser.with_tracker(Arc::clone(&tracker));
            grouper = grouper.with_tracker(Arc::clone(&tracker));
            selector = selector.with_tracker(tracker);
        }

        Self {
            engine,
            metadata,
            parser,
            grouper,
            selector,
        }
    }

    /// First round: parse, look up metadata, group, prefilter.
    ///
    /// Returns candidates for the caller to present, or a completed outcome
    /// when a fallback path resolved the search without user input.
    pub async fn begin(&self, query: &str, options: &SearchOptions) -> DiscoveryOutcome {
        options.emit(5, "Parsing query");
        let parsed = self.parser.parse(query).await;
        options.emit(15, "Query understood");
        debug!(?parsed, "Parsed query");

        if !parsed.has_terms() {
            info!("Nothing extractable from query, searching directly");
            let outcome = self
                .fallback_direct(query, options, OutcomeCode::UnknownQuery)
                .await;
            return DiscoveryOutcome::Completed(outcome);
        }

        let metadata_query = build_metadata_query(&parsed);
        let releases = match self
            .metadata
            .search_recordings(&metadata_query, parsed.artist.as_deref(), METADATA_LIMIT)
            .await
        {
            Ok(releases) => releases,
            Err(e) => {
                warn!(error = %e, "Metadata service unavailable");
                Vec::new()
            }
        };
        options.emit(30, "Metadata lookup complete");

        if releases.is_empty() {
            info!("No metadata hits, searching directly");
            let outcome = self
                .fallback_direct(query, options, OutcomeCode::MetadataUnavailable)
                .await;
            return DiscoveryOutcome::Completed(outcome);
        }

        let selection = self.grouper.group(&releases, &parsed).await;

        let kept = self.prefilter(&selection, options).await;
        if kept.is_empty() {
            info!("No release candidate has torrents, falling back to artist search");
            let outcome = self.fallback_artist(query, &parsed, options).await;
            return DiscoveryOutcome::Completed(outcome);
        }

        DiscoveryOutcome::Candidates {
            parsed,
            selection: Selection {
                releases: kept,
                search_type: selection.search_type,
                explanation: selection.explanation,
            },
        }
    }

    /// Second round: search for the user's selected release and pick the
    /// best candidate according to the strategy.
    pub async fn resume(
        &self,
        parsed: &ParsedQuery,
        selected: &GroupedRelease,
        strategy: SongStrategy,
        options: &SearchOptions,
    ) -> SearchOutcome {
        let release = &selected.release;
        let is_song = parsed.search_type == SearchType::Song && parsed.song.is_some();

        if is_song && release.album.is_some() {
            match strategy {
                SongStrategy::SingleOnly => {
                    return self.single_track_attempt(parsed, release, options, true).await;
                }
                SongStrategy::Auto => return self.auto_attempts(parsed, release, options).await,
                SongStrategy::OtherAlbums => {
                    return self
                        .other_albums_attempt(parsed, release, options, release.album.as_deref())
                        .await;
                }
                SongStrategy::SingleOrAlbum => {}
            }
        }

        // Default: precise query for the selected release.
        let query = build_torrent_query(release, false);
        options.emit(70, format!("Searching for \"{}\"", query));
        let results = self.search_with_format_fallback(&query, options).await;
        options.emit(85, format!("Found {} candidates", results.len()));

        if results.is_empty() {
            return SearchOutcome::empty(OutcomeCode::NoResults, query);
        }

        let preferences = SelectionPreferences {
            format: options.format_filter.clone(),
            prefer_song_only: false,
            expected_album: release.album.clone(),
            expected_artist: Some(release.artist.clone()),
        };
        self.conclude(query, results, release, &preferences, options)
            .await
    }

    /// Auto strategy: single track, then the selected album, then any
    /// other album containing the song. First success wins.
    async fn auto_attempts(
        &self,
        parsed: &ParsedQuery,
        release: &MetadataRelease,
        options: &SearchOptions,
    ) -> SearchOutcome {
        options.emit(65, "Auto mode: trying single track");
        let single = self.single_track_attempt(parsed, release, options, false).await;
        let mismatch = single.decision.as_ref().map(|d| d.album_mismatch);
        match mismatch {
            Some(false) => return single,
            Some(true) => {
                info!("Single-track candidates were from other albums, trying the album");
            }
            None => debug!("No single-track candidates"),
        }

        options.emit(75, "Auto mode: trying the selected album");
        let album_query = build_torrent_query(release, false);
        let album_results = self
            .search_with_format_fallback(&album_query, options)
            .await;
        if !album_results.is_empty() {
            let preferences = SelectionPreferences {
                format: options.format_filter.clone(),
                prefer_song_only: false,
                expected_album: release.album.clone(),
                expected_artist: Some(release.artist.clone()),
            };
            return self
                .conclude(album_query, album_results, release, &preferences, options)
                .await;
        }

        options.emit(85, "Auto mode: searching other albums");
        self.other_albums_attempt(parsed, release, options, None)
            .await
    }

    /// Attempt A: search for the song itself, keep small torrents.
    ///
    /// When `standalone` the attempt is terminal (NoResults on miss);
    /// otherwise the caller inspects the outcome and may continue.
    async fn single_track_attempt(
        &self,
        parsed: &ParsedQuery,
        release: &MetadataRelease,
        options: &SearchOptions,
        standalone: bool,
    ) -> SearchOutcome {
        let song = parsed.song.clone().unwrap_or_else(|| release.title.clone());
        let query = format!("{} {}", release.artist, sanitize_release_title(&song));
        options.emit(70, format!("Searching for \"{}\"", query));

        let results = self.search_with_format_fallback(&query, options).await;
        let song_only: Vec<MusicSource> = results
            .into_iter()
            .filter(|source| match source.size_bytes {
                Some(bytes) => (bytes as f64 / (1024.0 * 1024.0)) < SONG_ONLY_MAX_MB,
                None => true,
            })
            .collect();

        if song_only.is_empty() {
            return SearchOutcome::empty(
                if standalone {
                    OutcomeCode::NoResults
                } else {
                    OutcomeCode::Ok
                },
                query,
            );
        }

        let preferences = SelectionPreferences {
            format: options.format_filter.clone(),
            prefer_song_only: true,
            expected_album: release.album.clone(),
            expected_artist: Some(release.artist.clone()),
        };
        self.conclude(query, song_only, release, &preferences, options)
            .await
    }

    /// Attempt C: enumerate other albums containing the song, probe each
    /// for torrents, and pick the best-seeded album.
    async fn other_albums_attempt(
        &self,
        parsed: &ParsedQuery,
        release: &MetadataRelease,
        options: &SearchOptions,
        exclude_album: Option<&str>,
    ) -> SearchOutcome {
        let song = match &parsed.song {
            Some(song) => song.clone(),
            None => return SearchOutcome::empty(OutcomeCode::NoResults, String::new()),
        };

        let recordings = self
            .metadata
            .search_recordings(&song, Some(release.artist.as_str()), OTHER_ALBUMS_LIMIT)
            .await
            .unwrap_or_default();

        // One entry per distinct album.
        let mut albums: Vec<MetadataRelease> = Vec::new();
        for recording in recordings {
            let album = match &recording.album {
                Some(album) => album.clone(),
                None => continue,
            };
            if exclude_album.is_some_and(|excluded| excluded == album) {
                continue;
            }
            if albums.iter().any(|a| a.album.as_deref() == Some(album.as_str())) {
                continue;
            }
            albums.push(recording);
        }

        if albums.is_empty() {
            return SearchOutcome::empty(OutcomeCode::NoResults, song);
        }

        let mut found: Vec<(MetadataRelease, Vec<MusicSource>, u64)> = Vec::new();
        for (i, album) in albums.iter().enumerate() {
            let query = build_torrent_query(album, false);
            options.emit(
                85,
                format!("Checking album {}/{}: {}", i + 1, albums.len(), query),
            );
            let results = self.search_with_format_fallback(&query, options).await;
            if !results.is_empty() {
                let total_seeders: u64 = results
                    .iter()
                    .filter_map(|r| r.seeders)
                    .map(u64::from)
                    .sum();
                found.push((album.clone(), results, total_seeders));
            }
        }

        // Most available album first.
        found.sort_by(|a, b| (b.2, b.1.len()).cmp(&(a.2, a.1.len())));

        let (best_album, results, _) = match found.into_iter().next() {
            Some(best) => best,
            None => return SearchOutcome::empty(OutcomeCode::NoResults, song),
        };

        let query = build_torrent_query(&best_album, false);
        let preferences = SelectionPreferences {
            format: options.format_filter.clone(),
            prefer_song_only: false,
            expected_album: best_album.album.clone(),
            expected_artist: Some(best_album.artist.clone()),
        };
        self.conclude(query, results, &best_album, &preferences, options)
            .await
    }

    /// Availability probe: keep only releases with at least one torrent.
    async fn prefilter(
        &self,
        selection: &Selection,
        options: &SearchOptions,
    ) -> Vec<GroupedRelease> {
        let total = selection.releases.len();
        let mut kept = Vec::new();

        // Sequential on purpose so progress events arrive per candidate.
        for (i, candidate) in selection.releases.iter().enumerate() {
            let album = match &candidate.release.album {
                Some(album) => album,
                None => continue,
            };
            let query = format!("{} {}", candidate.release.artist, album);
            let percent = 30 + ((i + 1) * 30 / total.max(1)) as u8;
            options.emit(percent, format!("Checking availability: {}", album));

            let results = self
                .engine
                .search(&query, None, options.min_seeders)
                .await;
            if results.is_empty() {
                debug!(album = %album, "No torrents, candidate dropped");
            } else {
                kept.push(candidate.clone());
            }
        }

        kept
    }

    /// Generic artist-level search when no release candidate is available.
    async fn fallback_artist(
        &self,
        raw_query: &str,
        parsed: &ParsedQuery,
        options: &SearchOptions,
    ) -> SearchOutcome {
        let artist = match &parsed.artist {
            Some(artist) => artist.clone(),
            None => {
                return self
                    .fallback_direct(raw_query, options, OutcomeCode::NoCandidates)
                    .await
            }
        };

        options.emit(70, format!("Searching for \"{}\"", artist));
        let results = self.search_with_format_fallback(&artist, options).await;
        options.emit(85, format!("Found {} candidates", results.len()));

        if results.is_empty() {
            return SearchOutcome::empty(OutcomeCode::NoCandidates, artist);
        }

        let preferences = SelectionPreferences {
            format: options.format_filter.clone(),
            ..Default::default()
        };
        match self.selector.select(&artist, &results, &preferences).await {
            Ok(decision) => {
                options.emit(100, "Selection complete");
                SearchOutcome {
                    code: OutcomeCode::Ok,
                    query_used: artist,
                    results,
                    decision: Some(decision),
                    release: None,
                }
            }
            Err(_) => SearchOutcome::empty(OutcomeCode::NoCandidates, artist),
        }
    }

    /// Direct engine search on the raw query, bypassing metadata.
    async fn fallback_direct(
        &self,
        query: &str,
        options: &SearchOptions,
        empty_code: OutcomeCode,
    ) -> SearchOutcome {
        options.emit(70, format!("Searching for \"{}\"", query));
        let results = self.search_with_format_fallback(query, options).await;
        options.emit(85, format!("Found {} candidates", results.len()));

        if results.is_empty() {
            return SearchOutcome::empty(empty_code, query);
        }

        let preferences = SelectionPreferences {
            format: options.format_filter.clone(),
            ..Default::default()
        };
        match self.selector.select(query, &results, &preferences).await {
            Ok(decision) => {
                options.emit(100, "Selection complete");
                SearchOutcome {
                    code: OutcomeCode::Ok,
                    query_used: query.to_string(),
                    results,
                    decision: Some(decision),
                    release: None,
                }
            }
            Err(_) => SearchOutcome::empty(empty_code, query),
        }
    }

    /// Run the selector and assemble the final outcome.
    async fn conclude(
        &self,
        query: String,
        results: Vec<MusicSource>,
        release: &MetadataRelease,
        preferences: &SelectionPreferences,
        options: &SearchOptions,
    ) -> SearchOutcome {
        match self.selector.select(&query, &results, preferences).await {
            Ok(decision) => {
                options.emit(100, "Selection complete");
                SearchOutcome {
                    code: OutcomeCode::Ok,
                    query_used: query,
                    results,
                    decision: Some(decision),
                    release: Some(release.clone()),
                }
            }
            Err(_) => SearchOutcome::empty(OutcomeCode::NoResults, query),
        }
    }

    /// Search with the preferred format first, then any format, unless
    /// strict mode pins the filter.
    async fn search_with_format_fallback(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<MusicSource> {
        if let Some(format) = options.format_filter.as_deref() {
            if !options.strict {
                let results = self
                    .engine
                    .search(query, Some(format), options.min_seeders)
                    .await;
                if !results.is_empty() {
                    return results;
                }
                debug!(format, "No results in preferred format, trying any");
                return self.engine.search(query, None, options.min_seeders).await;
            }
        }

        self.engine
            .search(query, options.format_filter.as_deref(), options.min_seeders)
            .await
    }
}

/// Build the metadata-database query string from a parsed query.
fn build_metadata_query(parsed: &ParsedQuery) -> String {
    let mut parts = Vec::new();
    if let Some(song) = &parsed.song {
        parts.push(song.as_str());
    }
    if let Some(album) = &parsed.album {
        parts.push(album.as_str());
    }
    if parts.is_empty() {
        if let Some(artist) = &parsed.artist {
            parts.push(artist.as_str());
        }
    }
    parts.join(" ")
}

/// Strip edition suffixes, years, and bracketed qualifiers so the title
/// matches how torrent releases are actually named. Idempotent.
pub fn sanitize_release_title(text: &str) -> String {
    let text = match text.split_once(':') {
        Some((before, _)) => before,
        None => text,
    };
    let text = YEAR_RE.replace_all(text, "");
    let text = BRACKETS_RE.replace_all(&text, "");
    let text = PARENS_RE.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "{artist} {sanitized title}", preferring the album unless the caller
/// wants song-only results.
pub fn build_torrent_query(release: &MetadataRelease, prefer_song_only: bool) -> String {
    let title = if prefer_song_only {
        release.title.as_str()
    } else {
        release.album.as_deref().unwrap_or(release.title.as_str())
    };

    let sanitized = sanitize_release_title(title);
    if sanitized.is_empty() {
        release.artist.clone()
    } else {
        format!("{} {}", release.artist, sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(artist: &str, title: &str, album: Option<&str>) -> MetadataRelease {
        MetadataRelease {
            mbid: "m".to_string(),
            artist: artist.to_string(),
            title: title.to_string(),
            album: album.map(String::from),
            year: None,
            duration_ms: None,
            score: 90,
        }
    }

    #[test]
    fn test_sanitize_truncates_at_colon() {
        assert_eq!(
            sanitize_release_title("OK Computer: OKNOTOK 1997 2017"),
            "OK Computer"
        );
    }

    #[test]
    fn test_sanitize_strips_years_and_qualifiers() {
        assert_eq!(
            sanitize_release_title("In Rainbows [Deluxe] (Remastered 2009)"),
            "In Rainbows"
        );
        assert_eq!(sanitize_release_title("Kid A 2000"), "Kid A");
    }

    #[test]
    fn test_sanitize_idempotent() {
        let inputs = [
            "OK Computer: OKNOTOK 1997 2017",
            "In Rainbows [Deluxe] (2009)",
            "Plain Title",
        ];
        for input in inputs {
            let once = sanitize_release_title(input);
            assert_eq!(sanitize_release_title(&once), once);
        }
    }

    #[test]
    fn test_build_torrent_query_prefers_album() {
        let r = release("Radiohead", "Karma Police", Some("OK Computer"));
        assert_eq!(build_torrent_query(&r, false), "Radiohead OK Computer");
        assert_eq!(build_torrent_query(&r, true), "Radiohead Karma Police");
    }

    #[test]
    fn test_build_torrent_query_without_album() {
        let r = release("Radiohead", "Karma Police", None);
        assert_eq!(build_torrent_query(&r, false), "Radiohead Karma Police");
    }

    #[test]
    fn test_build_torrent_query_degenerate_title() {
        let r = release("Radiohead", "(2017)", None);
        assert_eq!(build_torrent_query(&r, false), "Radiohead");
    }

    #[test]
    fn test_build_metadata_query() {
        let parsed = ParsedQuery {
            artist: Some("Radiohead".to_string()),
            song: Some("Karma Police".to_string()),
            album: None,
            search_type: SearchType::Song,
            ..Default::default()
        };
        assert_eq!(build_metadata_query(&parsed), "Karma Police");

        let artist_only = ParsedQuery {
            artist: Some("Radiohead".to_string()),
            ..Default::default()
        };
        assert_eq!(build_metadata_query(&artist_only), "Radiohead");
    }
}
