use std::sync::Arc;

use harmonia_core::{Config, RankedSearch, SearchEngine, StreamAdapter};

/// Shared application state
pub struct AppState {
    config: Config,
    search: RankedSearch,
    stream: Option<Arc<StreamAdapter>>,
    profile_names: Vec<String>,
    active_profile: String,
}

impl AppState {
    pub fn new(
        config: Config,
        search: RankedSearch,
        stream: Option<Arc<StreamAdapter>>,
        profile_names: Vec<String>,
        active_profile: String,
    ) -> Self {
        Self {
            config,
            search,
            stream,
            profile_names,
            active_profile,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The ranked search service backing /search and the WS channel.
    pub fn search(&self) -> &RankedSearch {
        &self.search
    }

    /// The search engine, for adapter diagnostics.
    pub fn engine(&self) -> &Arc<SearchEngine> {
        self.search.engine()
    }

    /// The stream adapter, for on-demand URL resolution.
    pub fn stream(&self) -> Option<&Arc<StreamAdapter>> {
        self.stream.as_ref()
    }

    pub fn profile_names(&self) -> &[String] {
        &self.profile_names
    }

    pub fn active_profile(&self) -> &str {
        &self.active_profile
    }

    /// Whether search requests can be served at all.
    pub fn search_ready(&self) -> bool {
        !self.engine().adapters().is_empty()
    }
}
