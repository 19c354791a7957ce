//! Per-user library links, ratings and audio access

use crate::db::{genres, library, songs};
use crate::models::{LibraryFilter, LibrarySong, LibrarySort, Song, SongId, UserId};
use crate::services::blob_store::{BlobReader, BlobStore};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use cadenza_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct LibraryLinker {
    pool: SqlitePool,
    blobs: Arc<dyn BlobStore>,
}

impl LibraryLinker {
    pub fn new(pool: SqlitePool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { pool, blobs }
    }

    /// Link a song to a user; an existing link is left as is
    pub async fn add_user_song(&self, user_id: UserId, song_id: SongId) -> Result<()> {
        retry_on_lock("add_user_song", DEFAULT_MAX_LOCK_WAIT_MS, || {
            library::add_user_song(&self.pool, user_id, song_id)
        })
        .await
    }

    /// Set the user's rating; range checks belong to the caller
    pub async fn rate_song(&self, user_id: UserId, song_id: SongId, rating: i64) -> Result<()> {
        library::rate_song(&self.pool, user_id, song_id, rating).await
    }

    pub async fn remove_user_song(&self, user_id: UserId, song_id: SongId) -> Result<()> {
        if library::remove_user_song(&self.pool, user_id, song_id).await? {
            tracing::debug!(user_id, song_id, "Unlinked song");
        }
        Ok(())
    }

    pub async fn library_songs(
        &self,
        user_id: UserId,
        filter: &LibraryFilter,
        sort: LibrarySort,
    ) -> Result<Vec<LibrarySong>> {
        library::library_songs(&self.pool, user_id, filter, sort).await
    }

    /// Reassign a song's genre, creating the catalog entry if needed
    pub async fn set_song_genre(&self, user_id: UserId, song_id: SongId, genre: &str) -> Result<()> {
        let genre = genre.trim();
        if genre.is_empty() {
            return Err(Error::InvalidInput("Genre name must not be empty".to_string()));
        }
        if !library::user_has_song(&self.pool, user_id, song_id).await? {
            return Err(Error::NotFound(format!("Song {} in library of user {}", song_id, user_id)));
        }

        let genre_id = genres::find_or_create_genre(&self.pool, genre).await?;
        songs::set_song_genre(&self.pool, song_id, genre_id).await?;

        tracing::info!(user_id, song_id, genre, "Song genre updated");
        Ok(())
    }

    /// Song metadata plus a seekable reader over its audio
    pub async fn open_song(&self, user_id: UserId, song_id: SongId) -> Result<(Song, Box<dyn BlobReader>)> {
        if !library::user_has_song(&self.pool, user_id, song_id).await? {
            return Err(Error::NotFound(format!("Song {} in library of user {}", song_id, user_id)));
        }

        let song = songs::load_song(&self.pool, song_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Song {}", song_id)))?;
        let reader = self.blobs.get(&song.blob_key).await?;

        Ok((song, reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SortField, SortOrder};
    use crate::services::blob_store::FsBlobStore;
    use cadenza_common::db::init_memory_database;
    use tokio::io::AsyncReadExt;

    async fn seed_song(pool: &SqlitePool, hash: &str, blob_key: &str) -> SongId {
        sqlx::query_scalar(
            "INSERT INTO songs (content_hash, blob_key, title, modified_at) VALUES (?, ?, ?, datetime('now')) RETURNING id",
        )
        .bind(hash)
        .bind(blob_key)
        .bind(hash)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_link_is_idempotent_and_keeps_rating() {
        let pool = init_memory_database().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let song = seed_song(&pool, "aa11", "aa11.mp3").await;
        let linker = LibraryLinker::new(pool.clone(), Arc::new(FsBlobStore::new(dir.path())));

        linker.add_user_song(7, song).await.unwrap();
        linker.rate_song(7, song, 4).await.unwrap();
        linker.add_user_song(7, song).await.unwrap();

        let listed = linker
            .library_songs(7, &LibraryFilter::default(), LibrarySort::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].rating, Some(4));

        linker.remove_user_song(7, song).await.unwrap();
        linker.remove_user_song(7, song).await.unwrap();
        let listed = linker
            .library_songs(7, &LibraryFilter::default(), LibrarySort { field: SortField::Rating, order: SortOrder::Desc })
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_set_genre_requires_ownership() {
        let pool = init_memory_database().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let song = seed_song(&pool, "bb22", "bb22.mp3").await;
        let linker = LibraryLinker::new(pool.clone(), Arc::new(FsBlobStore::new(dir.path())));

        assert!(matches!(
            linker.set_song_genre(1, song, "Jazz").await,
            Err(Error::NotFound(_))
        ));

        linker.add_user_song(1, song).await.unwrap();
        linker.set_song_genre(1, song, "Jazz").await.unwrap();

        let listed = linker
            .library_songs(1, &LibraryFilter::default(), LibrarySort::default())
            .await
            .unwrap();
        assert_eq!(listed[0].genre.as_deref(), Some("Jazz"));
    }

    #[tokio::test]
    async fn test_open_song_streams_blob() {
        let pool = init_memory_database().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let mut content: &[u8] = b"riff";
        store.put("cc33.wav", &mut content, 4, "audio/wav").await.unwrap();

        let song = seed_song(&pool, "cc33", "cc33.wav").await;
        let linker = LibraryLinker::new(pool.clone(), Arc::new(store));
        linker.add_user_song(2, song).await.unwrap();

        let (meta, mut reader) = linker.open_song(2, song).await.unwrap();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await.unwrap();

        assert_eq!(meta.blob_key, "cc33.wav");
        assert_eq!(bytes, b"riff");
        assert!(matches!(linker.open_song(3, song).await, Err(Error::NotFound(_))));
    }
}
