//! Database Test Utilities

use sqlx::SqlitePool;
use tempfile::TempDir;

/// File-backed test database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> anyhow::Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_cadenza.db");
    let pool = cadenza_common::db::init_database(&db_path).await?;
    Ok((temp_dir, pool))
}

pub async fn song_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn user_song_count(pool: &SqlitePool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM user_songs WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn genre_count(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM genres WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}
