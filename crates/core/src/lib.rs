// Allow some clippy lints that are too noisy for this codebase
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::collapsible_if)]

pub mod advisor;
pub mod config;
pub mod external_catalog;
pub mod orchestrator;
pub mod profile;
pub mod query;
pub mod searcher;
pub mod service;
pub mod source;

/// Testing utilities and mock implementations for workflow tests.
///
/// This module provides mock implementations of the external service traits
/// (source adapters, metadata provider, LLM client), allowing comprehensive
/// testing without real infrastructure.
pub mod testing;

pub use advisor::{
    AdvisorConfig, AdvisorProvider, AnthropicClient, CandidateNote, CandidateSelector,
    CompletionRequest, CompletionResponse, GroupedRelease, LlmClient, LlmError, LlmUsage,
    OllamaClient, QueryUnderstanding, ReleaseGrouper, Selection, SelectionDecision,
    SelectionPreferences, SelectorError, SessionStats, SessionTracker,
};
pub use config::{load_config, load_config_from_str, Config, ConfigError, SearchConfig, ServerConfig};
pub use external_catalog::{
    ExternalCatalogError, MetadataProvider, MetadataRelease, MusicBrainzClient, MusicBrainzConfig,
};
pub use orchestrator::{
    DiscoveryOutcome, OutcomeCode, ProgressEvent, ProgressSender, SearchOptions, SearchOrchestrator,
    SearchOutcome, SongStrategy,
};
pub use profile::{
    AdapterFactory, BuiltAdapters, IndexerEntry, IndexerKind, Profile, ProfileDocument,
    ProfileError,
};
pub use query::{
    convert_to_sql, heuristic_parse, MusicQuery, OrderBy, ParsedQuery, QueryType, SearchType,
    SqlParser,
};
pub use searcher::{
    AdapterStatus, HealthRecord, HealthSnapshot, ScrapeAdapter, SearchEngine, SourceAdapter,
    StreamAdapter, TorznabAdapter, DEFAULT_AUDIO_CATEGORIES,
};
pub use service::{RankedSearch, SearchReport};
pub use source::{
    magnet_infohash, quality_score, sha1_hex, MetadataExtractor, MusicSource, RankedSource,
    SourceKind, MAX_QUALITY_SCORE,
};
