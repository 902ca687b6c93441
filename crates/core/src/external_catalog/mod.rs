//! Canonical music metadata lookup.
//!
//! Read-only client over a MusicBrainz-compatible web service, used by the
//! discovery workflow to disambiguate recordings into releases before any
//! torrent search happens.

mod musicbrainz;
mod types;

pub use musicbrainz::{MusicBrainzClient, MusicBrainzConfig};
pub use types::{ExternalCatalogError, MetadataProvider, MetadataRelease};
