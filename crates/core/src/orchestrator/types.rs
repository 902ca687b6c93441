//! Types for the discovery workflow.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::advisor::{Selection, SelectionDecision};
use crate::external_catalog::MetadataRelease;
use crate::query::ParsedQuery;
use crate::source::MusicSource;

/// Terminal status of a workflow run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeCode {
    Ok,
    UnknownQuery,
    MetadataUnavailable,
    NoCandidates,
    NoResults,
    /// Non-fatal: an advisor was unavailable and a fallback produced the
    /// result.
    AdvisorUnavailable,
}

/// Advisory progress event.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Strategy for song-type queries after the user picked a release.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SongStrategy {
    /// Only look for single-track torrents.
    SingleOnly,
    /// Prefer the selected album; the default.
    SingleOrAlbum,
    /// Search every other album containing the song.
    OtherAlbums,
    /// Try single, then the selected album, then other albums.
    Auto,
}

impl Default for SongStrategy {
    fn default() -> Self {
        SongStrategy::SingleOrAlbum
    }
}

/// Per-request knobs for the workflow.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub format_filter: Option<String>,
    /// Disables the "fall back to any format on zero results" behavior.
    /// Only meaningful together with `format_filter`.
    pub strict: bool,
    pub min_seeders: u32,
    /// Advisory progress channel; dropped events are ignored.
    pub progress: Option<ProgressSender>,
}

impl SearchOptions {
    pub fn emit(&self, percent: u8, message: impl Into<String>) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(ProgressEvent {
                percent,
                message: message.into(),
            });
        }
    }
}

/// Terminal result of the workflow.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub code: OutcomeCode,
    /// The indexer query string that produced the results.
    pub query_used: String,
    pub results: Vec<MusicSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<SelectionDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<MetadataRelease>,
}

impl SearchOutcome {
    pub fn empty(code: OutcomeCode, query_used: impl Into<String>) -> Self {
        Self {
            code,
            query_used: query_used.into(),
            results: Vec::new(),
            decision: None,
            release: None,
        }
    }
}

/// What the first workflow round produced: either candidates for the user
/// to choose from, or a completed outcome when a fallback path short-
/// circuited the interaction.
#[derive(Debug)]
pub enum DiscoveryOutcome {
    Candidates {
        parsed: ParsedQuery,
        selection: Selection,
    },
    Completed(SearchOutcome),
}
