//! Adapter contract for backend sources.

use async_trait::async_trait;
use serde::Serialize;

use crate::source::{MusicSource, SourceKind};

use super::health::{HealthRecord, HealthSnapshot};

/// Diagnostic view of one adapter, for status endpoints and logs.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterStatus {
    pub name: String,
    pub kind: SourceKind,
    #[serde(flatten)]
    pub health: HealthSnapshot,
}

/// Contract for a single backend source.
///
/// `search` either returns results (possibly empty) or records a failure
/// internally; it never surfaces an error to the engine. Health state is
/// owned by the adapter and consulted by the engine before dispatch.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable, human-readable source name.
    fn name(&self) -> &str;

    /// What kind of results this adapter produces.
    fn kind(&self) -> SourceKind;

    /// The adapter's circuit breaker.
    fn health(&self) -> &HealthRecord;

    /// Whether the engine should dispatch to this adapter.
    fn is_healthy(&self) -> bool {
        self.health().is_healthy()
    }

    /// Execute a search, returning normalized results.
    ///
    /// Network errors, timeouts, non-2xx responses and malformed payloads
    /// all count as failures against the health record and yield `[]`.
    async fn search(&self, query: &str) -> Vec<MusicSource>;

    /// Diagnostic snapshot.
    fn status(&self) -> AdapterStatus {
        AdapterStatus {
            name: self.name().to_string(),
            kind: self.kind(),
            health: self.health().snapshot(),
        }
    }
}
