//! Unified music source model.
//!
//! Every backend (torrent indexer, streaming catalog, local library)
//! normalizes its hits into [`MusicSource`], which carries a pure,
//! recomputable quality score and a stable dedup identity.

mod metadata;
mod scoring;
mod types;

pub use metadata::MetadataExtractor;
pub use scoring::{quality_score, MAX_QUALITY_SCORE};
pub use types::{magnet_infohash, sha1_hex, MusicSource, RankedSource, SourceKind};

#[cfg(test)]
pub(crate) use types::torrent_fixture;
