//! cadenza-ingest library
//!
//! Media library ingestion core: content-addressed deduplication, tag
//! extraction, genre resolution, audio embeddings, per-user libraries and
//! dense playlist ordering.
//!
//! [`Library`] wires the services together. Collaborators are injected
//! through [`Collaborators`]; [`Library::from_settings`] builds the live ones.

pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::IngestError;

use cadenza_common::config::Settings;
use cadenza_common::events::EventBus;
use cadenza_common::{Error, Result};
use models::{IngestOutcome, PlaylistId, SimilarSong, SongId, UserId};
use services::{
    BlobStore, EmbeddingProvider, EmbeddingStore, EnrichmentProvider, FsBlobStore,
    HttpEmbeddingClient, IngestPipeline, IngestQueue, LibraryLinker, LoftyTagReader,
    MusicBrainzClient, PlaylistExporter, PlaylistManager, SimilarityError, TagReader,
};
use sqlx::SqlitePool;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Event bus capacity for batch progress events
const EVENT_CAPACITY: usize = 256;

/// External collaborators of the ingest core
#[derive(Clone)]
pub struct Collaborators {
    pub blobs: Arc<dyn BlobStore>,
    pub tag_reader: Arc<dyn TagReader>,
    pub enrichment: Arc<dyn EnrichmentProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

/// Library tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct LibraryOptions {
    /// Files ingested concurrently across all batches
    pub worker_count: usize,
    /// Result count for similarity queries without an explicit limit
    pub similar_top_n: usize,
    /// Finished batch statuses kept for queries
    pub batch_retention: usize,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            worker_count: 4,
            similar_top_n: 5,
            batch_retention: services::ingest_queue::DEFAULT_BATCH_RETENTION,
        }
    }
}

pub struct Library {
    pool: SqlitePool,
    events: Arc<EventBus>,
    pipeline: Arc<IngestPipeline>,
    queue: IngestQueue,
    linker: Arc<LibraryLinker>,
    playlists: Arc<PlaylistManager>,
    exporter: PlaylistExporter,
    embeddings: EmbeddingStore,
    options: LibraryOptions,
}

impl Library {
    pub fn new(pool: SqlitePool, collaborators: Collaborators, options: LibraryOptions) -> Self {
        let events = Arc::new(EventBus::new(EVENT_CAPACITY));
        let linker = Arc::new(LibraryLinker::new(pool.clone(), collaborators.blobs.clone()));
        let playlists = Arc::new(PlaylistManager::new(pool.clone()));
        let exporter = PlaylistExporter::new(pool.clone(), collaborators.blobs.clone());

        let pipeline = Arc::new(IngestPipeline::new(
            pool.clone(),
            collaborators.blobs,
            collaborators.tag_reader,
            collaborators.enrichment,
            collaborators.embedder,
            linker.clone(),
            playlists.clone(),
        ));
        let queue = IngestQueue::new(pipeline.clone(), events.clone(), options.worker_count)
            .with_retention(options.batch_retention);

        Self {
            embeddings: EmbeddingStore::new(pool.clone()),
            pool,
            events,
            pipeline,
            queue,
            linker,
            playlists,
            exporter,
            options,
        }
    }

    /// Open the database and build the live collaborators from settings
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let pool = cadenza_common::db::init_database(&settings.database_path).await?;

        let enrichment = MusicBrainzClient::new(
            &settings.musicbrainz_url,
            &settings.musicbrainz_email,
            settings.request_timeout,
        )
        .map_err(|e| Error::Config(format!("MusicBrainz client: {}", e)))?;
        let embedder = HttpEmbeddingClient::new(&settings.embedding_url, settings.request_timeout)
            .map_err(|e| Error::Config(format!("Embedding client: {}", e)))?;

        tracing::info!(
            database = %settings.database_path.display(),
            blobs = %settings.blob_dir.display(),
            embedding_url = %settings.embedding_url,
            "Library services configured"
        );

        let collaborators = Collaborators {
            blobs: Arc::new(FsBlobStore::new(&settings.blob_dir)),
            tag_reader: Arc::new(LoftyTagReader::new()),
            enrichment: Arc::new(enrichment),
            embedder: Arc::new(embedder),
        };

        Ok(Self::new(
            pool,
            collaborators,
            LibraryOptions {
                worker_count: settings.worker_count,
                similar_top_n: settings.similar_top_n,
                ..LibraryOptions::default()
            },
        ))
    }

    /// Ingest one file synchronously
    pub async fn ingest(
        &self,
        path: &Path,
        user_id: UserId,
        playlist_id: Option<PlaylistId>,
    ) -> std::result::Result<IngestOutcome, IngestError> {
        self.pipeline.ingest(path, user_id, playlist_id).await
    }

    /// Ingest a scratch directory in the background
    pub async fn ingest_batch(
        &self,
        scratch_dir: PathBuf,
        user_id: UserId,
        playlist_id: Option<PlaylistId>,
    ) -> Result<Uuid> {
        self.queue.submit(scratch_dir, user_id, playlist_id).await
    }

    /// Songs most similar to `song_id`, `top_n` defaulting to the configured count
    pub async fn similar_songs(
        &self,
        song_id: SongId,
        top_n: Option<usize>,
    ) -> std::result::Result<Vec<SimilarSong>, SimilarityError> {
        self.embeddings
            .similar_to_song(song_id, top_n.unwrap_or(self.options.similar_top_n))
            .await
    }

    /// Write an owned playlist to `writer` as a zip archive
    pub async fn export_playlist<W: Write + Seek + Send>(
        &self,
        user_id: UserId,
        playlist_id: PlaylistId,
        writer: W,
    ) -> Result<W> {
        self.exporter.export(user_id, playlist_id, writer).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn queue(&self) -> &IngestQueue {
        &self.queue
    }

    pub fn linker(&self) -> &LibraryLinker {
        &self.linker
    }

    pub fn playlists(&self) -> &PlaylistManager {
        &self.playlists
    }

    pub fn embeddings(&self) -> &EmbeddingStore {
        &self.embeddings
    }

    /// Cancel running batches and wait for them to wind down
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
        self.pool.close().await;
    }
}
