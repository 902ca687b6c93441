//! Query understanding: advisor tier over the deterministic parser.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::query::{heuristic_parse, ParsedQuery, SearchType};

use super::json::extract_json_object;
use super::llm::{CompletionRequest, LlmClient};
use super::session::SessionTracker;

/// Parses natural-language queries, preferring a configured model and
/// falling back to [`heuristic_parse`] on any failure.
pub struct QueryUnderstanding {
    client: Option<Arc<dyn LlmClient>>,
    tracker: Option<Arc<SessionTracker>>,
}

/// Shape the advisor is asked to produce. Unknown keys are ignored.
#[derive(Debug, Deserialize)]
struct AdvisorParse {
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    song: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    search_type: SearchType,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    ambiguous: bool,
}

impl QueryUnderstanding {
    pub fn new(client: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            client,
            tracker: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<SessionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Parse a query. Always produces a usable result.
    pub async fn parse(&self, query: &str) -> ParsedQuery {
        if let Some(client) = &self.client {
            match self.try_advisor(client.as_ref(), query).await {
                Some(parsed) => return parsed,
                None => {
                    warn!(query, "Query advisor failed, using heuristics");
                }
            }
        }

        heuristic_parse(query)
    }

    async fn try_advisor(&self, client: &dyn LlmClient, query: &str) -> Option<ParsedQuery> {
        let request = CompletionRequest::new(build_prompt(query)).with_max_tokens(512);

        let response = match client.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "Query advisor call failed");
                return None;
            }
        };

        if let Some(tracker) = &self.tracker {
            tracker.track(&response.model, &response.usage);
        }

        let json = extract_json_object(&response.text)?;
        let advisor: AdvisorParse = match serde_json::from_str(json) {
            Ok(a) => a,
            Err(e) => {
                debug!(error = %e, "Query advisor returned invalid JSON");
                return None;
            }
        };

        let parsed = ParsedQuery {
            artist: advisor.artist.filter(|s| !s.is_empty()),
            song: advisor.song.filter(|s| !s.is_empty()),
            album: advisor.album.filter(|s| !s.is_empty()),
            year: advisor.year,
            search_type: advisor.search_type,
            confidence: advisor.confidence.clamp(0.0, 1.0),
            ambiguous: advisor.ambiguous,
        };

        if !parsed.invariants_hold() {
            debug!("Query advisor output violated type invariants");
            return None;
        }

        Some(parsed)
    }
}

fn build_prompt(query: &str) -> String {
    format!(
        r#"Parse this music search query and extract structured information.

Query: "{query}"

Respond with JSON only:
{{
  "artist": "<artist name or null>",
  "song": "<song title or null>",
  "album": "<album name or null>",
  "year": <year or null>,
  "search_type": "song|album|discography|artist|unknown",
  "confidence": <0.0-1.0>,
  "ambiguous": <true|false>
}}

Examples:
- "radiohead ok computer" -> {{"artist": "Radiohead", "album": "OK Computer", "search_type": "album", "confidence": 0.95}}
- "Esperanza Spalding I know" -> {{"artist": "Esperanza Spalding", "song": "I Know You Know", "search_type": "song", "confidence": 0.8}}
- "Miles Davis" -> {{"artist": "Miles Davis", "search_type": "discography", "confidence": 0.9}}
- "yesterday" -> {{"song": "Yesterday", "search_type": "song", "ambiguous": true, "confidence": 0.4}}

Parse the query above:"#
    )
}
