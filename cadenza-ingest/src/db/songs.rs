//! Song database operations

use crate::models::{GenreId, NewSong, Song, SongId};
use cadenza_common::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const SONG_COLUMNS: &str = "s.id, s.content_hash, s.blob_key, s.content_type, s.title, s.artist, \
     s.album, s.year, s.genre_id, s.duration_ms, s.bitrate_kbps, s.file_size_bytes, \
     s.modified_at, s.created_at";

/// Column list shared with library queries (table alias `s`)
pub(crate) fn song_columns() -> &'static str {
    SONG_COLUMNS
}

pub(crate) fn song_from_row(row: &SqliteRow) -> Result<Song> {
    Ok(Song {
        id: row.try_get("id")?,
        content_hash: row.try_get("content_hash")?,
        blob_key: row.try_get("blob_key")?,
        content_type: row.try_get("content_type")?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        album: row.try_get("album")?,
        year: row.try_get("year")?,
        genre_id: row.try_get("genre_id")?,
        duration_ms: row.try_get("duration_ms")?,
        bitrate_kbps: row.try_get("bitrate_kbps")?,
        file_size_bytes: row.try_get("file_size_bytes")?,
        modified_at: row.try_get("modified_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Dedup lookup by content hash
pub async fn find_song_id_by_hash(pool: &SqlitePool, content_hash: &str) -> Result<Option<SongId>> {
    let id = sqlx::query_scalar("SELECT id FROM songs WHERE content_hash = ?")
        .bind(content_hash)
        .fetch_optional(pool)
        .await?;

    Ok(id)
}

/// Insert a new song row
///
/// A concurrent insert of the same content hash fails with a unique
/// violation; callers recover with [`find_song_id_by_hash`].
pub async fn insert_song(pool: &SqlitePool, song: &NewSong) -> Result<SongId> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO songs (
            content_hash, blob_key, content_type, title, artist, album, year,
            genre_id, duration_ms, bitrate_kbps, file_size_bytes, modified_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&song.content_hash)
    .bind(&song.blob_key)
    .bind(&song.content_type)
    .bind(&song.title)
    .bind(&song.artist)
    .bind(&song.album)
    .bind(song.year)
    .bind(song.genre_id)
    .bind(song.duration_ms)
    .bind(song.bitrate_kbps)
    .bind(song.file_size_bytes)
    .bind(song.modified_at)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Load song by id
pub async fn load_song(pool: &SqlitePool, song_id: SongId) -> Result<Option<Song>> {
    let row = sqlx::query(&format!("SELECT {} FROM songs s WHERE s.id = ?", SONG_COLUMNS))
        .bind(song_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(song_from_row).transpose()
}

pub async fn song_exists(pool: &SqlitePool, song_id: SongId) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM songs WHERE id = ?")
        .bind(song_id)
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}

/// Point a song at a genre
pub async fn set_song_genre(pool: &SqlitePool, song_id: SongId, genre_id: GenreId) -> Result<()> {
    sqlx::query("UPDATE songs SET genre_id = ? WHERE id = ?")
        .bind(genre_id)
        .bind(song_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_common::db::init_memory_database;

    fn sample(hash: &str) -> NewSong {
        NewSong {
            content_hash: hash.to_string(),
            blob_key: format!("{}.mp3", hash),
            content_type: "audio/mpeg".to_string(),
            title: "Roundabout".to_string(),
            artist: "Yes".to_string(),
            album: "Fragile".to_string(),
            year: 1971,
            genre_id: None,
            duration_ms: 510_000,
            bitrate_kbps: 320,
            file_size_bytes: 20_400_000,
            modified_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let pool = init_memory_database().await.unwrap();

        let id = insert_song(&pool, &sample("aa11")).await.unwrap();
        let song = load_song(&pool, id).await.unwrap().unwrap();

        assert_eq!(song.title, "Roundabout");
        assert_eq!(song.year, 1971);
        assert_eq!(song.blob_key, "aa11.mp3");
        assert_eq!(find_song_id_by_hash(&pool, "aa11").await.unwrap(), Some(id));
        assert!(song_exists(&pool, id).await.unwrap());
        assert!(load_song(&pool, id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_hash_is_unique_violation() {
        let pool = init_memory_database().await.unwrap();

        insert_song(&pool, &sample("bb22")).await.unwrap();
        let err = insert_song(&pool, &sample("bb22")).await.unwrap_err();

        assert!(err.is_unique_violation());
    }
}
