//! Structured query types.

use serde::{Deserialize, Serialize};

/// What the user is looking for, as understood by the parser.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Song,
    Album,
    Discography,
    Artist,
    Unknown,
}

impl Default for SearchType {
    fn default() -> Self {
        SearchType::Unknown
    }
}

/// Structured intent for one user request. Immutable once built.
///
/// Invariants: `search_type == Song` implies `song` is set; `Album` implies
/// `album` is set. [`ParsedQuery::invariants_hold`] checks both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedQuery {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub ambiguous: bool,
}

impl ParsedQuery {
    /// Whether the parser extracted anything at all.
    pub fn has_terms(&self) -> bool {
        self.artist.is_some() || self.song.is_some() || self.album.is_some()
    }

    /// Check the type/field invariants.
    pub fn invariants_hold(&self) -> bool {
        match self.search_type {
            SearchType::Song => self.song.is_some(),
            SearchType::Album => self.album.is_some(),
            _ => true,
        }
    }
}

/// `SELECT` target in the SQL-ish syntax.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Album,
    Track,
    Artist,
    Compilation,
}

/// Result ordering column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    Quality,
    Seeders,
    Size,
    Date,
    Relevance,
}

/// SQL-ish filter set for the ranked search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicQuery {
    pub query_type: QueryType,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub year_range: Option<(i32, i32)>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub bitrate: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub min_seeders: u32,
    #[serde(default)]
    pub min_size_mb: Option<u64>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
    pub order_by: OrderBy,
    pub order_desc: bool,
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl MusicQuery {
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            artist: None,
            album: None,
            track: None,
            year: None,
            year_range: None,
            format: None,
            bitrate: None,
            source: None,
            country: None,
            label: None,
            min_seeders: 0,
            min_size_mb: None,
            max_size_mb: None,
            order_by: OrderBy::Quality,
            order_desc: true,
            limit: 50,
            offset: 0,
        }
    }

    /// Flatten the structured fields back into an indexer search string.
    /// Falls back to the raw query when nothing was extracted.
    pub fn search_terms(&self, raw: &str) -> String {
        let mut terms = Vec::new();
        if let Some(artist) = &self.artist {
            terms.push(artist.as_str());
        }
        if let Some(album) = &self.album {
            terms.push(album.as_str());
        }
        if let Some(track) = &self.track {
            terms.push(track.as_str());
        }
        if terms.is_empty() {
            raw.to_string()
        } else {
            terms.join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_query_invariants() {
        let song = ParsedQuery {
            song: Some("Karma Police".to_string()),
            search_type: SearchType::Song,
            ..Default::default()
        };
        assert!(song.invariants_hold());

        let bad_song = ParsedQuery {
            search_type: SearchType::Song,
            ..Default::default()
        };
        assert!(!bad_song.invariants_hold());

        let album = ParsedQuery {
            album: Some("OK Computer".to_string()),
            search_type: SearchType::Album,
            ..Default::default()
        };
        assert!(album.invariants_hold());

        let unknown = ParsedQuery::default();
        assert!(unknown.invariants_hold());
        assert!(!unknown.has_terms());
    }

    #[test]
    fn test_search_terms_fallback() {
        let query = MusicQuery::new(QueryType::Album);
        assert_eq!(query.search_terms("raw text"), "raw text");

        let mut query = MusicQuery::new(QueryType::Album);
        query.artist = Some("Radiohead".to_string());
        query.album = Some("OK Computer".to_string());
        assert_eq!(query.search_terms("raw"), "Radiohead OK Computer");
    }

    #[test]
    fn test_defaults() {
        let query = MusicQuery::new(QueryType::Track);
        assert_eq!(query.limit, 50);
        assert!(query.order_desc);
        assert_eq!(query.order_by, OrderBy::Quality);
        assert_eq!(query.min_seeders, 0);
    }
}
