//! Collaborator doubles and library construction

use cadenza_ingest::models::TrackTags;
use cadenza_ingest::services::{
    EmbeddingProvider, EnrichmentProvider, FsBlobStore, StaticEmbedder, StaticEnrichment,
    TagError, TagReader,
};
use cadenza_ingest::{Collaborators, Library, LibraryOptions};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tag reader answering from a table keyed by file name
///
/// Unknown names read as empty tags; names marked broken fail extraction.
#[derive(Debug, Default)]
pub struct FixedTagReader {
    tags: HashMap<String, TrackTags>,
    broken: HashSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixedTagReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, file_name: &str, tags: TrackTags) -> Self {
        self.tags.insert(file_name.to_string(), tags);
        self
    }

    pub fn with_broken(mut self, file_name: &str) -> Self {
        self.broken.insert(file_name.to_string());
        self
    }

    /// Sleep on every read to keep files in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TagReader for FixedTagReader {
    fn read_tags(&self, path: &Path) -> Result<TrackTags, TagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        if self.broken.contains(&name) {
            return Err(TagError::Read(format!("{} is not an audio container", name)));
        }
        Ok(self.tags.get(&name).cloned().unwrap_or_default())
    }
}

/// Library over `pool` with blobs under `blob_dir`
pub fn test_library(
    pool: SqlitePool,
    blob_dir: &Path,
    tag_reader: Arc<dyn TagReader>,
    enrichment: Arc<dyn EnrichmentProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    worker_count: usize,
) -> Library {
    Library::new(
        pool,
        Collaborators {
            blobs: Arc::new(FsBlobStore::new(blob_dir)),
            tag_reader,
            enrichment,
            embedder,
        },
        LibraryOptions {
            worker_count,
            ..LibraryOptions::default()
        },
    )
}

/// Library with empty enrichment and an 8-dimension content embedder
pub fn default_library(pool: SqlitePool, blob_dir: &Path, tag_reader: Arc<dyn TagReader>) -> Library {
    test_library(
        pool,
        blob_dir,
        tag_reader,
        Arc::new(StaticEnrichment::new()),
        Arc::new(StaticEmbedder::new(8)),
        4,
    )
}
