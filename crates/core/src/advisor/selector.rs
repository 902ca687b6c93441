//! Candidate selection: pick the best source from a result list.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::source::MusicSource;

use super::json::extract_json_object;
use super::llm::{CompletionRequest, LlmClient};
use super::session::SessionTracker;

const MAX_TOP_CANDIDATES: usize = 3;
const MAX_REJECTED: usize = 5;

/// User preferences influencing selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionPreferences {
    /// Preferred format; a soft signal for the advisor (the engine applies
    /// the hard filter earlier).
    pub format: Option<String>,
    /// Prioritize single-track torrents over full albums.
    pub prefer_song_only: bool,
    /// When set, the advisor must reject candidates from other albums.
    pub expected_album: Option<String>,
    pub expected_artist: Option<String>,
}

/// A candidate with the advisor's commentary.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateNote {
    pub index: usize,
    pub source: MusicSource,
    pub reason: String,
}

/// Outcome of one selection.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionDecision {
    pub selected: MusicSource,
    pub selected_index: usize,
    pub reasoning: String,
    pub top_candidates: Vec<CandidateNote>,
    pub rejected: Vec<CandidateNote>,
    /// True when the quality-score fallback produced this decision.
    pub fallback_used: bool,
    /// True when the advisor signalled that no candidate matches the
    /// expected album.
    pub album_mismatch: bool,
}

/// Errors from selection. Empty input is the caller's mistake and the only
/// error this component surfaces.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("cannot select from an empty candidate list")]
    NoCandidates,
}

/// Selects the best source from a candidate list, via advisor when
/// configured, by quality score otherwise.
pub struct CandidateSelector {
    client: Option<Arc<dyn LlmClient>>,
    tracker: Option<Arc<SessionTracker>>,
}

impl CandidateSelector {
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

    /// Select the best candidate.
    pub async fn select(
        &self,
        query: &str,
        candidates: &[MusicSource],
        preferences: &SelectionPreferences,
    ) -> Result<SelectionDecision, SelectorError> {
        if candidates.is_empty() {
            return Err(SelectorError::NoCandidates);
        }

        if let Some(client) = &self.client {
            match self
                .try_advisor(client.as_ref(), query, candidates, preferences)
                .await
            {
                Some(decision) => return Ok(decision),
                None => {
                    warn!(query, "Selection advisor failed, using quality fallback");
                }
            }
        }

        Ok(quality_fallback(
            candidates,
            "Selected by quality score",
            false,
        ))
    }

    /// Rewrite a query for better indexer recall. Returns the original on
    /// any failure.
    pub async fn optimize_query(&self, original: &str, context: Option<&str>) -> String {
        let client = match &self.client {
            Some(c) => c,
            None => return original.to_string(),
        };

        let context_line = context
            .map(|c| format!("Context: {}\n", c))
            .unwrap_or_default();
        let prompt = format!(
            "You are a music search expert. Optimize this query for better indexer results.\n\n\
             Original query: \"{original}\"\n{context_line}\n\
             Return ONLY the optimized query, nothing else."
        );

        match client
            .complete(CompletionRequest::new(prompt).with_max_tokens(128))
            .await
        {
            Ok(response) => {
                if let Some(tracker) = &self.tracker {
                    tracker.track(&response.model, &response.usage);
                }
                let optimized = response.text.trim().trim_matches('"').to_string();
                if optimized.is_empty() {
                    original.to_string()
                } else {
                    optimized
                }
            }
            Err(_) => original.to_string(),
        }
    }

    async fn try_advisor(
        &self,
        client: &dyn LlmClient,
        query: &str,
        candidates: &[MusicSource],
        preferences: &SelectionPreferences,
    ) -> Option<SelectionDecision> {
        let request = CompletionRequest::new(build_prompt(query, candidates, preferences))
            .with_max_tokens(1024);

        let response = match client.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "Selection advisor call failed");
                return None;
            }
        };

        if let Some(tracker) = &self.tracker {
            tracker.track(&response.model, &response.usage);
        }

        let json = extract_json_object(&response.text)?;
        let data: Value = serde_json::from_str(json).ok()?;

        let selected_index = match data.get("selected_index").and_then(Value::as_i64) {
            Some(index) => index,
            None => {
                debug!("Selection advisor response missing integer selected_index");
                return None;
            }
        };

        // -1 is the advisor's "nothing matches the expected album" signal.
        if selected_index == -1 {
            return Some(quality_fallback(
                candidates,
                "No candidate matched the expected album; selected highest quality score",
                true,
            ));
        }

        let selected_index = match usize::try_from(selected_index) {
            Ok(i) if i < candidates.len() => i,
            _ => {
                debug!(selected_index, "Selection advisor index out of range");
                return Some(quality_fallback(
                    candidates,
                    "Advisor selected an invalid index; selected highest quality score",
                    false,
                ));
            }
        };

        let reasoning = data
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or("No reasoning provided")
            .to_string();

        let selected = candidates[selected_index].clone();
        info!(
            index = selected_index,
            title = %selected.title,
            score = selected.quality_score,
            "Advisor selected candidate"
        );

        Some(SelectionDecision {
            selected,
            selected_index,
            reasoning,
            top_candidates: collect_notes(
                data.get("top_3"),
                candidates,
                MAX_TOP_CANDIDATES,
            ),
            rejected: collect_notes(
                data.get("rejected_sample"),
                candidates,
                MAX_REJECTED,
            ),
            fallback_used: false,
            album_mismatch: false,
        })
    }
}

/// Deterministic selection: the candidate with the highest quality score.
fn quality_fallback(
    candidates: &[MusicSource],
    reason: &str,
    album_mismatch: bool,
) -> SelectionDecision {
    let (index, best) = candidates
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.quality_score
                .partial_cmp(&b.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("candidates verified non-empty");

    info!(
        score = best.quality_score,
        format = best.format.as_deref().unwrap_or("unknown"),
        "Quality score fallback selection"
    );

    SelectionDecision {
        selected: best.clone(),
        selected_index: index,
        reasoning: reason.to_string(),
        top_candidates: vec![CandidateNote {
            index,
            source: best.clone(),
            reason: "Highest quality score".to_string(),
        }],
        rejected: Vec::new(),
        fallback_used: true,
        album_mismatch,
    }
}

fn collect_notes(
    value: Option<&Value>,
    candidates: &[MusicSource],
    cap: usize,
) -> Vec<CandidateNote> {
    let items = match value.and_then(Value::as_array) {
        Some(items) => items,
        None => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| {
            let index = usize::try_from(item.get("index")?.as_i64()?).ok()?;
            if index >= candidates.len() {
                return None;
            }
            Some(CandidateNote {
                index,
                source: candidates[index].clone(),
                reason: item
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .take(cap)
        .collect()
}

fn build_prompt(
    query: &str,
    candidates: &[MusicSource],
    preferences: &SelectionPreferences,
) -> String {
    let mut listing = String::new();
    for (i, candidate) in candidates.iter().enumerate() {
        listing.push_str(&format!(
            "[{}] {}\n    Format: {}  Bitrate: {}  Size: {}  Seeders: {}  Source: {}  Quality: {:.1}\n",
            i,
            candidate.title,
            candidate.format.as_deref().unwrap_or("Unknown"),
            candidate.bitrate.as_deref().unwrap_or("Unknown"),
            candidate.size_formatted(),
            candidate.seeders.map(|s| s.to_string()).unwrap_or_else(|| "n/a".to_string()),
            candidate.indexer,
            candidate.quality_score,
        ));
    }

    let mut preference_lines = String::new();
    if let Some(format) = &preferences.format {
        preference_lines.push_str(&format!("- MUST match format: {}\n", format));
    }
    if preferences.prefer_song_only {
        preference_lines.push_str(
            "- User wants single-track torrents, NOT full albums. Prefer small sizes and \
             'single' in the title; avoid multi-disc releases.\n",
        );
    }

    let album_filter = match (&preferences.expected_album, &preferences.expected_artist) {
        (Some(album), Some(artist)) => format!(
            "MANDATORY ALBUM FILTER: the user selected \"{album}\" by {artist}. ONLY consider \
             torrents whose title contains that album name; REJECT everything else. If nothing \
             matches, respond with selected_index -1.\n\n"
        ),
        (Some(album), None) => format!(
            "ALBUM FILTER: only select torrents matching the album \"{album}\". If nothing \
             matches, respond with selected_index -1.\n\n"
        ),
        _ => String::new(),
    };

    format!(
        r#"You are an audiophile music expert selecting the best torrent for a search.

Search query: "{query}"

{album_filter}Candidates:
{listing}
Selection criteria, in order:
1. Album filter above, if present (a filter, not a ranking factor).
2. Audio quality: DSD > 24-bit FLAC > 16-bit FLAC > 320kbps MP3 > V0 > lower.
3. Seeders (availability).
4. Completeness.
{preference_lines}
Respond with JSON only:
{{
  "selected_index": <number>,
  "reasoning": "<why>",
  "top_3": [{{"index": <n>, "reason": "<why good>"}}],
  "rejected_sample": [{{"index": <n>, "reason": "<why rejected>"}}]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::torrent_fixture;
    use crate::testing::MockLlmClient;

    fn candidates() -> Vec<MusicSource> {
        vec![
            torrent_fixture("Album [MP3 320]", "magnet:?xt=urn:btih:aa", 30),
            torrent_fixture("Album [FLAC]", "magnet:?xt=urn:btih:bb", 20),
            torrent_fixture("Album rip", "magnet:?xt=urn:btih:cc", 90),
        ]
    }

    #[tokio::test]
    async fn test_empty_candidates_is_error() {
        let selector = CandidateSelector::new(None);
        let result = selector
            .select("q", &[], &SelectionPreferences::default())
            .await;
        assert!(matches!(result, Err(SelectorError::NoCandidates)));
    }

    #[tokio::test]
    async fn test_quality_fallback_picks_argmax() {
        let selector = CandidateSelector::new(None);
        let candidates = candidates();
        let decision = selector
            .select("q", &candidates, &SelectionPreferences::default())
            .await
            .unwrap();

        assert!(decision.fallback_used);
        assert!(!decision.album_mismatch);
        let best = candidates
            .iter()
            .map(|c| c.quality_score)
            .fold(f64::MIN, f64::max);
        assert_eq!(decision.selected.quality_score, best);
        assert_eq!(
            decision.selected.identity(),
            candidates[decision.selected_index].identity()
        );
    }

    #[tokio::test]
    async fn test_advisor_selection() {
        let client = Arc::new(MockLlmClient::replying(
            r#"{
                "selected_index": 1,
                "reasoning": "FLAC wins",
                "top_3": [{"index": 1, "reason": "lossless"}, {"index": 0, "reason": "320"}],
                "rejected_sample": [{"index": 2, "reason": "unknown format"}]
            }"#,
        ));
        let selector = CandidateSelector::new(Some(client));
        let decision = selector
            .select("q", &candidates(), &SelectionPreferences::default())
            .await
            .unwrap();

        assert!(!decision.fallback_used);
        assert_eq!(decision.selected_index, 1);
        assert_eq!(decision.reasoning, "FLAC wins");
        assert_eq!(decision.top_candidates.len(), 2);
        assert_eq!(decision.rejected.len(), 1);
        assert_eq!(decision.rejected[0].index, 2);
    }

    #[tokio::test]
    async fn test_advisor_minus_one_is_album_mismatch() {
        let client = Arc::new(MockLlmClient::replying(
            r#"{"selected_index": -1, "reasoning": "nothing from that album"}"#,
        ));
        let selector = CandidateSelector::new(Some(client));
        let decision = selector
            .select("q", &candidates(), &SelectionPreferences::default())
            .await
            .unwrap();

        assert!(decision.fallback_used);
        assert!(decision.album_mismatch);
    }

    #[tokio::test]
    async fn test_advisor_out_of_range_falls_back() {
        let client = Arc::new(MockLlmClient::replying(r#"{"selected_index": 42}"#));
        let selector = CandidateSelector::new(Some(client));
        let decision = selector
            .select("q", &candidates(), &SelectionPreferences::default())
            .await
            .unwrap();

        assert!(decision.fallback_used);
        assert!(!decision.album_mismatch);
    }

    #[tokio::test]
    async fn test_advisor_non_integer_index_falls_back() {
        let client = Arc::new(MockLlmClient::replying(
            r#"{"selected_index": "two", "reasoning": "oops"}"#,
        ));
        let selector = CandidateSelector::new(Some(client));
        let decision = selector
            .select("q", &candidates(), &SelectionPreferences::default())
            .await
            .unwrap();

        assert!(decision.fallback_used);
    }

    #[tokio::test]
    async fn test_advisor_no_json_falls_back() {
        let client = Arc::new(MockLlmClient::replying("I would pick the FLAC one."));
        let selector = CandidateSelector::new(Some(client));
        let decision = selector
            .select("q", &candidates(), &SelectionPreferences::default())
            .await
            .unwrap();

        assert!(decision.fallback_used);
    }

    #[tokio::test]
    async fn test_advisor_error_falls_back() {
        let client = Arc::new(MockLlmClient::failing());
        let selector = CandidateSelector::new(Some(client));
        let decision = selector
            .select("q", &candidates(), &SelectionPreferences::default())
            .await
            .unwrap();

        assert!(decision.fallback_used);
    }

    #[tokio::test]
    async fn test_selected_is_member_of_input() {
        let client = Arc::new(MockLlmClient::replying(r#"{"selected_index": 0}"#));
        let selector = CandidateSelector::new(Some(client));
        let candidates = candidates();
        let decision = selector
            .select("q", &candidates, &SelectionPreferences::default())
            .await
            .unwrap();

        assert!(candidates
            .iter()
            .any(|c| c.identity() == decision.selected.identity()));
    }

    #[test]
    fn test_prompt_contains_album_filter() {
        let preferences = SelectionPreferences {
            expected_album: Some("The Book of Souls".to_string()),
            expected_artist: Some("Iron Maiden".to_string()),
            ..Default::default()
        };
        let prompt = build_prompt("q", &candidates(), &preferences);
        assert!(prompt.contains("MANDATORY ALBUM FILTER"));
        assert!(prompt.contains("The Book of Souls"));
        assert!(prompt.contains("selected_index -1"));
    }

    #[tokio::test]
    async fn test_optimize_query_fallback_to_original() {
        let selector = CandidateSelector::new(None);
        assert_eq!(selector.optimize_query("radiohead", None).await, "radiohead");

        let failing = CandidateSelector::new(Some(Arc::new(MockLlmClient::failing())));
        assert_eq!(
            failing.optimize_query("radiohead", Some("no results")).await,
            "radiohead"
        );
    }

    #[tokio::test]
    async fn test_optimize_query_advisor() {
        let client = Arc::new(MockLlmClient::replying("\"Radiohead OK Computer FLAC\""));
        let selector = CandidateSelector::new(Some(client));
        assert_eq!(
            selector.optimize_query("radiohead okc", None).await,
            "Radiohead OK Computer FLAC"
        );
    }
}
