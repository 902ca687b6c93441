//! Mock metadata provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::external_catalog::{ExternalCatalogError, MetadataProvider, MetadataRelease};

/// Mock implementation of [`MetadataProvider`].
pub struct MockMetadataProvider {
    recordings: Mutex<Vec<MetadataRelease>>,
    fail: AtomicBool,
    queries: Mutex<Vec<String>>,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self {
            recordings: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_recordings(self, recordings: Vec<MetadataRelease>) -> Self {
        *self.recordings.lock().unwrap() = recordings;
        self
    }

    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Quick release constructor for tests.
    pub fn release(
        mbid: &str,
        artist: &str,
        title: &str,
        album: Option<&str>,
        score: u8,
    ) -> MetadataRelease {
        MetadataRelease {
            mbid: mbid.to_string(),
            artist: artist.to_string(),
            title: title.to_string(),
            album: album.map(String::from),
            year: None,
            duration_ms: None,
            score,
        }
    }
}

impl Default for MockMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn search_recordings(
        &self,
        query: &str,
        _artist: Option<&str>,
        limit: u32,
    ) -> Result<Vec<MetadataRelease>, ExternalCatalogError> {
        self.queries.lock().unwrap().push(query.to_string());

        if self.fail.load(Ordering::SeqCst) {
            return Err(ExternalCatalogError::Http("mock outage".to_string()));
        }

        let mut recordings = self.recordings.lock().unwrap().clone();
        recordings.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.mbid.cmp(&b.mbid)));
        recordings.truncate(limit as usize);
        Ok(recordings)
    }

    async fn recording_by_id(
        &self,
        mbid: &str,
    ) -> Result<Option<MetadataRelease>, ExternalCatalogError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExternalCatalogError::Http("mock outage".to_string()));
        }
        Ok(self
            .recordings
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.mbid == mbid)
            .cloned())
    }
}
