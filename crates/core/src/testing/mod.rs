//! Testing utilities and mock implementations.
//!
//! Mock implementations of the external-service traits (source adapters,
//! metadata provider, LLM client), allowing full workflow tests without
//! real infrastructure.

mod fixtures;
mod mock_adapter;
mod mock_llm;
mod mock_metadata;

pub use fixtures::{stream_source, torrent_source};
pub use mock_adapter::MockAdapter;
pub use mock_llm::MockLlmClient;
pub use mock_metadata::MockMetadataProvider;
