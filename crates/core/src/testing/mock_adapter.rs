//! Mock source adapter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::searcher::{HealthRecord, SourceAdapter};
use crate::source::{MusicSource, SourceKind};

type QueryHandler = Box<dyn Fn(&str) -> Vec<MusicSource> + Send + Sync>;

/// Mock implementation of [`SourceAdapter`].
///
/// Returns fixed results, per-query results via a handler, or simulated
/// failures; records every query for assertions.
pub struct MockAdapter {
    name: String,
    kind: SourceKind,
    health: HealthRecord,
    results: Mutex<Vec<MusicSource>>,
    handler: Option<QueryHandler>,
    fail: AtomicBool,
    queries: Mutex<Vec<String>>,
}

impl MockAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Torrent,
            health: HealthRecord::new(),
            results: Mutex::new(Vec::new()),
            handler: None,
            fail: AtomicBool::new(false),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_results(self, results: Vec<MusicSource>) -> Self {
        *self.results.lock().unwrap() = results;
        self
    }

    /// Produce results per query instead of a fixed list.
    pub fn with_handler(
        mut self,
        handler: impl Fn(&str) -> Vec<MusicSource> + Send + Sync + 'static,
    ) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Every search fails (and counts against health) until unset.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_results(&self, results: Vec<MusicSource>) {
        *self.results.lock().unwrap() = results;
    }

    /// Queries seen so far, in order.
    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn health(&self) -> &HealthRecord {
        &self.health
    }

    async fn search(&self, query: &str) -> Vec<MusicSource> {
        self.queries.lock().unwrap().push(query.to_string());

        if self.fail.load(Ordering::SeqCst) {
            self.health.record(false);
            return Vec::new();
        }

        let results = match &self.handler {
            Some(handler) => handler(query),
            None => self.results.lock().unwrap().clone(),
        };
        self.health.record(true);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::torrent_source;

    #[tokio::test]
    async fn test_fixed_results_and_recording() {
        let adapter = MockAdapter::new("mock")
            .with_results(vec![torrent_source("T [FLAC]", "aa", 5, 400)]);

        let results = adapter.search("some query").await;
        assert_eq!(results.len(), 1);
        assert_eq!(adapter.recorded_queries(), vec!["some query"]);
        assert!(adapter.is_healthy());
    }

    #[tokio::test]
    async fn test_failing_counts_against_health() {
        let adapter = MockAdapter::new("mock").failing();
        for _ in 0..3 {
            assert!(adapter.search("q").await.is_empty());
        }
        assert!(!adapter.is_healthy());
    }

    #[tokio::test]
    async fn test_query_handler() {
        let adapter = MockAdapter::new("mock").with_handler(|query| {
            if query.contains("radiohead") {
                vec![torrent_source("Radiohead hit", "bb", 3, 100)]
            } else {
                Vec::new()
            }
        });

        assert_eq!(adapter.search("radiohead ok computer").await.len(), 1);
        assert!(adapter.search("someone else").await.is_empty());
    }
}
