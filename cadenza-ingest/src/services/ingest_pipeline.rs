//! Single-file ingest pipeline
//!
//! hash → dedup → extract → store → enrich → genre → persist → embed →
//! link → playlist. Known content skips straight to linking. Enrichment and
//! embedding degrade to warnings; every other stage failure aborts the file.

use crate::db::{genres, songs};
use crate::error::IngestError;
use crate::models::{IngestOutcome, NewSong, PlaylistId, SongId, TrackTags, UserId};
use crate::services::blob_store::{blob_key, BlobError, BlobStore};
use crate::services::embedding_client::EmbeddingProvider;
use crate::services::embedding_store::EmbeddingStore;
use crate::services::enrichment::{Correction, EnrichmentProvider};
use crate::services::genre_resolver::GenreResolver;
use crate::services::hasher::hash_file;
use crate::services::library_linker::LibraryLinker;
use crate::services::playlist_manager::PlaylistManager;
use crate::services::tag_reader::{TagError, TagReader};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// MIME type from magic bytes, falling back to the extension
pub fn detect_content_type(path: &Path) -> String {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return kind.mime_type().to_string();
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Overwrite tag fields with any corrections the enrichment service offers
fn apply_enrichment(tags: &mut TrackTags, correction: Correction) {
    if let Some(album) = correction.album {
        tags.album = album;
    }
    if let Some(artist) = correction.artist {
        tags.artist = artist;
    }
    if let Some(year) = correction.year {
        tags.year = year;
    }
}

pub struct IngestPipeline {
    pool: SqlitePool,
    blobs: Arc<dyn BlobStore>,
    tag_reader: Arc<dyn TagReader>,
    enrichment: Arc<dyn EnrichmentProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    genre_resolver: GenreResolver,
    embeddings: EmbeddingStore,
    linker: Arc<LibraryLinker>,
    playlists: Arc<PlaylistManager>,
}

impl IngestPipeline {
    pub fn new(
        pool: SqlitePool,
        blobs: Arc<dyn BlobStore>,
        tag_reader: Arc<dyn TagReader>,
        enrichment: Arc<dyn EnrichmentProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        linker: Arc<LibraryLinker>,
        playlists: Arc<PlaylistManager>,
    ) -> Self {
        Self {
            genre_resolver: GenreResolver::new(pool.clone(), enrichment.clone()),
            embeddings: EmbeddingStore::new(pool.clone()),
            pool,
            blobs,
            tag_reader,
            enrichment,
            embedder,
            linker,
            playlists,
        }
    }

    /// Ingest one file for `user_id`, optionally appending it to a playlist
    pub async fn ingest(
        &self,
        path: &Path,
        user_id: UserId,
        playlist_id: Option<PlaylistId>,
    ) -> Result<IngestOutcome, IngestError> {
        let hash = hash_file(path).await.map_err(IngestError::Hash)?;
        tracing::debug!(file = %path.display(), hash = %hash, "Hashed file");

        let existing = songs::find_song_id_by_hash(&self.pool, &hash)
            .await
            .map_err(IngestError::Dedup)?;

        let outcome = match existing {
            Some(song_id) => {
                tracing::debug!(file = %path.display(), hash = %hash, song_id, "Content already in library");
                IngestOutcome { song_id, created: false }
            }
            None => self.ingest_new(path, &hash).await?,
        };

        self.linker
            .add_user_song(user_id, outcome.song_id)
            .await
            .map_err(IngestError::Link)?;
        tracing::debug!(song_id = outcome.song_id, user_id, "Linked song to user");

        if let Some(playlist_id) = playlist_id {
            self.playlists
                .add_or_move(playlist_id, outcome.song_id, 0)
                .await
                .map_err(IngestError::Playlist)?;
        }

        Ok(outcome)
    }

    async fn ingest_new(&self, path: &Path, hash: &str) -> Result<IngestOutcome, IngestError> {
        let mut tags = self.read_tags(path).await?;
        tracing::debug!(
            file = %path.display(),
            title = %tags.title,
            artist = %tags.artist,
            "Extracted tags"
        );

        let key = blob_key(hash, path);
        let content_type = detect_content_type(path);
        let (file_size, modified_at) = self.store_blob(path, &key, &content_type).await?;

        if !tags.artist.is_empty() && !tags.title.is_empty() {
            match self.enrichment.enrich(&tags.artist, &tags.title).await {
                Ok(Some(correction)) => apply_enrichment(&mut tags, correction),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Enrichment failed, keeping file tags");
                }
            }
        }

        let genre = self
            .genre_resolver
            .resolve(&tags, path)
            .await
            .map_err(IngestError::Genre)?;
        let genre_id = if genre.is_empty() {
            None
        } else {
            Some(
                genres::find_or_create_genre(&self.pool, &genre)
                    .await
                    .map_err(IngestError::Genre)?,
            )
        };

        let new_song = NewSong {
            content_hash: hash.to_string(),
            blob_key: key,
            content_type: content_type.clone(),
            title: tags.title,
            artist: tags.artist,
            album: tags.album,
            year: tags.year,
            genre_id,
            duration_ms: tags.duration_ms,
            bitrate_kbps: tags.bitrate_kbps,
            file_size_bytes: file_size as i64,
            modified_at,
        };

        let inserted = retry_on_lock("insert_song", DEFAULT_MAX_LOCK_WAIT_MS, || {
            songs::insert_song(&self.pool, &new_song)
        })
        .await;

        let song_id = match inserted {
            Ok(id) => id,
            Err(e) if e.is_unique_violation() => {
                let id = songs::find_song_id_by_hash(&self.pool, hash)
                    .await
                    .map_err(IngestError::Persist)?
                    .ok_or(IngestError::Persist(e))?;
                tracing::debug!(file = %path.display(), hash = %hash, song_id = id, "Concurrent duplicate resolved");
                return Ok(IngestOutcome { song_id: id, created: false });
            }
            Err(e) => return Err(IngestError::Persist(e)),
        };

        tracing::info!(
            file = %path.display(),
            hash = %hash,
            song_id,
            genre = %genre,
            "Song created"
        );

        self.embed(path, song_id, &content_type).await;

        Ok(IngestOutcome { song_id, created: true })
    }

    async fn read_tags(&self, path: &Path) -> Result<TrackTags, IngestError> {
        let reader = self.tag_reader.clone();
        let path_buf: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || reader.read_tags(&path_buf))
            .await
            .map_err(|e| IngestError::Extract(TagError::Read(format!("tag reader task failed: {}", e))))?
            .map_err(IngestError::Extract)
    }

    async fn store_blob(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<(u64, DateTime<Utc>), IngestError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| IngestError::Store(BlobError::Io(e)))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| IngestError::Store(BlobError::Io(e)))?;
        let size = metadata.len();
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        self.blobs
            .put(key, &mut file, size, content_type)
            .await
            .map_err(IngestError::Store)?;

        tracing::debug!(file = %path.display(), key, size, "Stored blob");
        Ok((size, modified_at))
    }

    async fn embed(&self, path: &Path, song_id: SongId, content_type: &str) {
        let vector = match self.embedder.embed(path, content_type).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(file = %path.display(), song_id, error = %e, "Embedding unavailable");
                return;
            }
        };

        if let Err(e) = self.embeddings.save_embedding(song_id, &vector).await {
            tracing::warn!(song_id, error = %e, "Failed to store embedding");
        } else {
            tracing::debug!(song_id, dimension = vector.len(), "Stored embedding");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mp3 = dir.path().join("x.MP3");
        let unknown = dir.path().join("x.bin");
        std::fs::write(&mp3, b"not really audio").unwrap();
        std::fs::write(&unknown, b"not really audio").unwrap();

        assert_eq!(detect_content_type(&mp3), "audio/mpeg");
        assert_eq!(detect_content_type(&unknown), "application/octet-stream");
    }

    #[test]
    fn test_enrichment_overwrites_only_offered_fields() {
        let mut tags = TrackTags {
            title: "Roundabout".to_string(),
            artist: "yes".to_string(),
            album: "".to_string(),
            year: 0,
            genre: "Rock".to_string(),
            ..Default::default()
        };
        apply_enrichment(
            &mut tags,
            Correction {
                album: Some("Fragile".to_string()),
                artist: None,
                year: Some(1971),
            },
        );

        assert_eq!(tags.artist, "yes");
        assert_eq!(tags.album, "Fragile");
        assert_eq!(tags.year, 1971);
        assert_eq!(tags.genre, "Rock");
    }
}
