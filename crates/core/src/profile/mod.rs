//! Source profiles and adapter construction.
//!
//! A profile document (YAML) names ordered sets of indexer configurations.
//! The factory resolves `${VAR}` placeholders from a context map, drops
//! disabled entries, and instantiates the adapter list for the engine.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::searcher::{ScrapeAdapter, SourceAdapter, StreamAdapter, TorznabAdapter};

static VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{(\w+)\}").unwrap());

/// Adapter backend kind in the profile document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexerKind {
    Torznab,
    Html,
    Stream,
}

/// One indexer entry in a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: IndexerKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

/// A named profile: an ordered list of indexer entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub indexers: Vec<IndexerEntry>,
}

/// The whole profile document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub default_profile: String,
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Errors loading a profile document.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse profile document: {0}")]
    Parse(String),
}

/// The constructed adapter set.
///
/// The stream adapter is exposed separately because on-demand URL
/// resolution needs it after search time.
pub struct BuiltAdapters {
    pub adapters: Vec<Arc<dyn SourceAdapter>>,
    pub stream: Option<Arc<StreamAdapter>>,
}

/// Builds adapters from a profile document.
pub struct AdapterFactory {
    document: ProfileDocument,
}

impl AdapterFactory {
    pub fn new(document: ProfileDocument) -> Self {
        Self { document }
    }

    /// Load a profile document from disk, falling back to the built-in
    /// minimal profile when the file is missing or unreadable.
    pub fn from_path(path: &Path) -> Self {
        match load_document(path) {
            Ok(document) => Self::new(document),
            Err(e) => {
                warn!(error = %e, "Using built-in source profile");
                Self::new(builtin_document())
            }
        }
    }

    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.document.profiles.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn default_profile(&self) -> &str {
        &self.document.default_profile
    }

    /// Instantiate the adapters of a profile. An unknown profile name falls
    /// back to the built-in minimal profile.
    pub fn build(&self, profile_name: Option<&str>, context: &HashMap<String, String>) -> BuiltAdapters {
        let name = profile_name.unwrap_or(&self.document.default_profile);

        let profile = match self.document.profiles.get(name) {
            Some(profile) => profile.clone(),
            None => {
                warn!(profile = name, "Unknown profile, using built-in fallback");
                let fallback = builtin_document();
                let fallback_name = fallback.default_profile.clone();
                fallback.profiles[&fallback_name].clone()
            }
        };

        info!(profile = name, indexers = profile.indexers.len(), "Building adapters");

        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        let mut stream: Option<Arc<StreamAdapter>> = None;

        for entry in &profile.indexers {
            if !entry.enabled {
                continue;
            }

            let base_url = entry
                .base_url
                .as_deref()
                .map(|v| substitute_vars(v, context));
            let api_key = entry
                .api_key
                .as_deref()
                .map(|v| substitute_vars(v, context));

            match entry.kind {
                IndexerKind::Torznab => {
                    adapters.push(Arc::new(TorznabAdapter::new(
                        entry.name.clone(),
                        base_url.unwrap_or_else(|| "http://localhost:9117".to_string()),
                        api_key.unwrap_or_default(),
                        entry.indexer_id.clone().unwrap_or_else(|| "all".to_string()),
                        entry.categories.clone(),
                        entry.timeout,
                    )));
                }
                IndexerKind::Html => {
                    let base_url = match base_url {
                        Some(url) => url,
                        None => {
                            warn!(indexer = %entry.name, "HTML indexer without base_url skipped");
                            continue;
                        }
                    };
                    adapters.push(Arc::new(ScrapeAdapter::new(
                        entry.name.clone(),
                        base_url,
                        entry.timeout,
                    )));
                }
                IndexerKind::Stream => {
                    let base_url = match base_url {
                        Some(url) => url,
                        None => {
                            warn!(indexer = %entry.name, "Stream source without base_url skipped");
                            continue;
                        }
                    };
                    let adapter = Arc::new(StreamAdapter::new(
                        entry.name.clone(),
                        base_url,
                        entry.timeout,
                    ));
                    if stream.is_none() {
                        stream = Some(Arc::clone(&adapter));
                    }
                    adapters.push(adapter);
                }
            }
        }

        BuiltAdapters { adapters, stream }
    }
}

/// Replace `${VAR}` tokens from the context; unknown variables stay literal.
pub fn substitute_vars(value: &str, context: &HashMap<String, String>) -> String {
    VAR_RE
        .replace_all(value, |captures: &regex_lite::Captures| {
            context
                .get(&captures[1])
                .cloned()
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

fn load_document(path: &Path) -> Result<ProfileDocument, ProfileError> {
    if !path.exists() {
        return Err(ProfileError::FileNotFound(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| ProfileError::Parse(e.to_string()))?;
    serde_yaml::from_str(&text).map_err(|e| ProfileError::Parse(e.to_string()))
}

/// Minimal profile used when no document is available: one local torznab
/// proxy keyed from the environment context.
fn builtin_document() -> ProfileDocument {
    let mut profiles = HashMap::new();
    profiles.insert(
        "local".to_string(),
        Profile {
            description: "Built-in minimal profile".to_string(),
            indexers: vec![IndexerEntry {
                name: "jackett-local".to_string(),
                kind: IndexerKind::Torznab,
                enabled: true,
                base_url: Some("http://localhost:9117".to_string()),
                api_key: Some("${JACKETT_API_KEY}".to_string()),
                indexer_id: Some("all".to_string()),
                categories: None,
                timeout: None,
            }],
        },
    );
    ProfileDocument {
        default_profile: "local".to_string(),
        profiles,
    }
}
