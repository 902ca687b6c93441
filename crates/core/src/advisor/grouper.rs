//! Release grouping for user disambiguation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::external_catalog::MetadataRelease;
use crate::query::{ParsedQuery, SearchType};

use super::json::extract_json_object;
use super::llm::{CompletionRequest, LlmClient};
use super::session::SessionTracker;

const MAX_GROUPS: usize = 5;
const HARD_GROUP_CAP: usize = 10;
const RELEASES_SHOWN_TO_ADVISOR: usize = 20;

/// One release candidate offered to the user.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedRelease {
    /// Display label.
    pub label: String,
    pub release: MetadataRelease,
    /// Why this candidate is relevant.
    pub reason: String,
    pub recommended: bool,
}

/// The grouped candidate set for one query.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub releases: Vec<GroupedRelease>,
    pub search_type: SearchType,
    pub explanation: String,
}

/// Groups raw metadata hits into at most a handful of user-facing choices.
pub struct ReleaseGrouper {
    client: Option<Arc<dyn LlmClient>>,
    tracker: Option<Arc<SessionTracker>>,
    max_groups: usize,
}

#[derive(Debug, Deserialize)]
struct AdvisorGrouping {
    #[serde(default)]
    search_type: Option<SearchType>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    groups: Vec<AdvisorGroup>,
}

#[derive(Debug, Deserialize)]
struct AdvisorGroup {
    index: i64,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    recommended: bool,
}

impl ReleaseGrouper {
    pub fn new(client: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            client,
            tracker: None,
            max_groups: MAX_GROUPS,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<SessionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_max_groups(mut self, max_groups: usize) -> Self {
        self.max_groups = max_groups.min(HARD_GROUP_CAP);
        self
    }

    /// Group metadata hits for user selection.
    pub async fn group(&self, releases: &[MetadataRelease], parsed: &ParsedQuery) -> Selection {
        if releases.is_empty() {
            return Selection {
                releases: Vec::new(),
                search_type: parsed.search_type,
                explanation: "No results found in the metadata database".to_string(),
            };
        }

        if let Some(client) = &self.client {
            match self.try_advisor(client.as_ref(), releases, parsed).await {
                Some(selection) if !selection.releases.is_empty() => return selection,
                _ => {
                    warn!("Grouping advisor failed, using deterministic grouping");
                }
            }
        }

        self.fallback(releases, parsed)
    }

    async fn try_advisor(
        &self,
        client: &dyn LlmClient,
        releases: &[MetadataRelease],
        parsed: &ParsedQuery,
    ) -> Option<Selection> {
        let request =
            CompletionRequest::new(self.build_prompt(releases, parsed)).with_max_tokens(1024);

        let response = match client.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "Grouping advisor call failed");
                return None;
            }
        };

        if let Some(tracker) = &self.tracker {
            tracker.track(&response.model, &response.usage);
        }

        let json = extract_json_object(&response.text)?;
        let grouping: AdvisorGrouping = match serde_json::from_str(json) {
            Ok(g) => g,
            Err(e) => {
                debug!(error = %e, "Grouping advisor returned invalid JSON");
                return None;
            }
        };

        let mut grouped = Vec::new();
        for group in grouping.groups.into_iter().take(HARD_GROUP_CAP) {
            let index = match usize::try_from(group.index) {
                Ok(i) if i < releases.len() => i,
                _ => {
                    debug!(index = group.index, "Grouping advisor index out of range");
                    continue;
                }
            };
            let release = &releases[index];
            grouped.push(GroupedRelease {
                label: group
                    .label
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| default_label(release)),
                release: release.clone(),
                reason: group.reason.unwrap_or_default(),
                recommended: group.recommended,
            });
        }

        Some(Selection {
            releases: grouped,
            search_type: grouping.search_type.unwrap_or(parsed.search_type),
            explanation: grouping.explanation,
        })
    }

    /// Deterministic grouping: the first five hits, first one recommended.
    fn fallback(&self, releases: &[MetadataRelease], parsed: &ParsedQuery) -> Selection {
        let grouped: Vec<GroupedRelease> = releases
            .iter()
            .take(self.max_groups)
            .enumerate()
            .map(|(i, release)| GroupedRelease {
                label: default_label(release),
                release: release.clone(),
                reason: "Metadata database result".to_string(),
                recommended: i == 0,
            })
            .collect();

        Selection {
            releases: grouped,
            search_type: parsed.search_type,
            explanation: format!("Found {} results", releases.len()),
        }
    }

    fn build_prompt(&self, releases: &[MetadataRelease], parsed: &ParsedQuery) -> String {
        let mut listing = String::new();
        for (i, release) in releases.iter().take(RELEASES_SHOWN_TO_ADVISOR).enumerate() {
            listing.push_str(&format!("[{}] {} - {}\n", i, release.artist, release.title));
            if let Some(album) = &release.album {
                listing.push_str(&format!("    Album: {}\n", album));
            }
            if let Some(year) = release.year {
                listing.push_str(&format!("    Year: {}\n", year));
            }
        }

        format!(
            r#"You are a music library expert. Group and filter these metadata results for user selection.

User's query intent:
  Artist: {artist}
  Song: {song}
  Album: {album}
  Search type: {search_type:?}

Results:
{listing}
Rules:
1. For a SONG appearing on multiple albums: group by album, prioritize Deluxe > Original > Compilation > Live, recommend the most complete version.
2. For an ALBUM with multiple editions: show up to 5 editions, recommend by completeness.
3. For ARTIST ONLY: group into popular albums / discography / hits.
4. If AMBIGUOUS (several artists share the song): group by artist, show the top 3-5.

Return JSON only (max {max_groups} groups):
{{
  "search_type": "song|album|discography|artist|unknown",
  "explanation": "<what you found>",
  "groups": [
    {{"index": <number from results>, "label": "<display label>", "reason": "<why>", "recommended": <true|false>}}
  ]
}}

Be concise."#,
            artist = parsed.artist.as_deref().unwrap_or("unknown"),
            song = parsed.song.as_deref().unwrap_or("unknown"),
            album = parsed.album.as_deref().unwrap_or("unknown"),
            search_type = parsed.search_type,
            max_groups = self.max_groups,
        )
    }
}

fn default_label(release: &MetadataRelease) -> String {
    match &release.album {
        Some(album) => format!("{} - {}", release.artist, album),
        None => format!("{} - {}", release.artist, release.title),
    }
}
