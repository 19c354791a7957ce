//! Library schema
//!
//! Uniqueness constraints here are load-bearing: the ingest pipeline relies on
//! them to resolve concurrent duplicate inserts (content hash, genre name,
//! user/song link, playlist position).

use crate::Result;
use sqlx::SqlitePool;
use tracing::debug;

/// Create all library tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_genres_table(pool).await?;
    create_songs_table(pool).await?;
    create_user_songs_table(pool).await?;
    create_playlists_table(pool).await?;
    create_playlist_songs_table(pool).await?;
    create_song_embeddings_table(pool).await?;

    debug!("Library schema ready");
    Ok(())
}

async fn create_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genres (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_hash TEXT NOT NULL UNIQUE,
            blob_key TEXT NOT NULL,
            content_type TEXT NOT NULL DEFAULT 'application/octet-stream',
            title TEXT NOT NULL DEFAULT '',
            artist TEXT NOT NULL DEFAULT '',
            album TEXT NOT NULL DEFAULT '',
            year INTEGER NOT NULL DEFAULT 0,
            genre_id INTEGER REFERENCES genres(id),
            duration_ms INTEGER NOT NULL DEFAULT 0,
            bitrate_kbps INTEGER NOT NULL DEFAULT 0,
            file_size_bytes INTEGER NOT NULL DEFAULT 0,
            modified_at TIMESTAMP NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_songs (
            user_id INTEGER NOT NULL,
            song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
            rating INTEGER,
            added_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, song_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_playlists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_playlists_user ON playlists(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_playlist_songs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist_songs (
            playlist_id INTEGER NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
            song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            PRIMARY KEY (playlist_id, song_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Positions are unique per playlist; shifts go through negative values
    // because SQLite checks UNIQUE row by row during UPDATE.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_playlist_songs_position ON playlist_songs(playlist_id, position)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_song_embeddings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS song_embeddings (
            song_id INTEGER PRIMARY KEY REFERENCES songs(id) ON DELETE CASCADE,
            dimension INTEGER NOT NULL,
            embedding TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
