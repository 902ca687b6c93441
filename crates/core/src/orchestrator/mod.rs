//! Interactive discovery workflow.
//!
//! Drives the multi-round search: parse the query, look up canonical
//! metadata, group releases for disambiguation, prefilter them by torrent
//! availability, then search and select against the user's choice with
//! configurable fallback strategies. Progress is reported over an advisory
//! channel that never gates control flow.

mod runner;
mod types;

pub use runner::{build_torrent_query, sanitize_release_title, SearchOrchestrator};
pub use types::{
    DiscoveryOutcome, OutcomeCode, ProgressEvent, ProgressSender, SearchOptions, SearchOutcome,
    SongStrategy,
};
