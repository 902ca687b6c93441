//! Fan-out/fan-in search across all healthy adapters.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::source::MusicSource;

use super::types::{AdapterStatus, SourceAdapter};

/// Orchestrates concurrent searches across a fixed set of adapters.
///
/// The output order is fully determined by `(quality_score desc, identity
/// asc)`; the order in which adapters complete does not affect it.
pub struct SearchEngine {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SearchEngine {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    /// Diagnostic snapshots for every adapter, healthy or not.
    pub fn adapter_status(&self) -> Vec<AdapterStatus> {
        self.adapters.iter().map(|a| a.status()).collect()
    }

    /// Search all healthy adapters and return deduplicated, filtered,
    /// quality-sorted results.
    ///
    /// `min_seeders` only applies to results that carry a seeder count;
    /// streams always pass. `format_filter` is ignored when empty or `"*"`.
    pub async fn search(
        &self,
        query: &str,
        format_filter: Option<&str>,
        min_seeders: u32,
    ) -> Vec<MusicSource> {
        let healthy: Vec<&Arc<dyn SourceAdapter>> =
            self.adapters.iter().filter(|a| a.is_healthy()).collect();

        let skipped = self.adapters.len() - healthy.len();
        if skipped > 0 {
            debug!(skipped, "Skipping tripped adapters");
        }

        if healthy.is_empty() {
            return Vec::new();
        }

        debug!(
            query = %query,
            adapters = healthy.len(),
            "Starting parallel search"
        );

        let searches = healthy.iter().map(|adapter| {
            let adapter = Arc::clone(*adapter);
            let query = query.to_string();
            async move {
                let results = adapter.search(&query).await;
                debug!(
                    adapter = adapter.name(),
                    results = results.len(),
                    "Adapter search complete"
                );
                results
            }
        });

        let all: Vec<MusicSource> = futures::future::join_all(searches)
            .await
            .into_iter()
            .flatten()
            .collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut keyed: Vec<(String, MusicSource)> = Vec::with_capacity(all.len());
        for source in all {
            let identity = source.identity();
            if identity.is_empty() || seen.insert(identity.clone()) {
                keyed.push((identity, source));
            }
        }

        keyed.retain(|(_, source)| match source.seeders {
            Some(seeders) => seeders >= min_seeders,
            None => true,
        });

        if let Some(format) = format_filter {
            if !format.is_empty() && format != "*" {
                keyed.retain(|(_, source)| {
                    source
                        .format
                        .as_deref()
                        .map(|f| f.eq_ignore_ascii_case(format))
                        .unwrap_or(false)
                });
            }
        }

        keyed.sort_by(|(id_a, a), (id_b, b)| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| id_a.cmp(id_b))
        });

        keyed.into_iter().map(|(_, source)| source).collect()
    }
}
