//! Federated source search.
//!
//! A [`SourceAdapter`] wraps one backend (torznab proxy, HTML indexer,
//! streaming catalog) behind a uniform contract with per-adapter circuit
//! breaking. The [`SearchEngine`] fans a query out across all healthy
//! adapters, deduplicates by identity, filters, and sorts by quality.

mod engine;
mod health;
mod scrape;
mod stream;
mod torznab;
mod types;

pub use engine::SearchEngine;
pub use health::{HealthRecord, HealthSnapshot};
pub use scrape::ScrapeAdapter;
pub use stream::StreamAdapter;
pub use torznab::{TorznabAdapter, DEFAULT_AUDIO_CATEGORIES};
pub use types::{AdapterStatus, SourceAdapter};
