//! Tests for database initialization

use cadenza_common::db::{init_database, init_memory_database};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("dir").join("cadenza.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());

    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_rows() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cadenza.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO genres (name) VALUES ('Jazz')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM genres")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(names, vec!["Jazz"]);
}

#[tokio::test]
async fn test_path_with_url_characters() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("mix #1?");
    let db_path = dir.join("cadenza.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO genres (name) VALUES ('Dub')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    assert!(db_path.is_file());
    assert!(!temp_dir.path().join("mix ").exists());

    let pool = init_database(&db_path).await.unwrap();
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM genres")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(names, vec!["Dub"]);
}

#[tokio::test]
async fn test_pragmas_applied() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("cadenza.db")).await.unwrap();

    let journal: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(journal.to_lowercase(), "wal");

    let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let pool = init_memory_database().await.unwrap();

    let result = sqlx::query("INSERT INTO user_songs (user_id, song_id) VALUES (1, 999)")
        .execute(&pool)
        .await;
    assert!(result.is_err(), "link to a missing song must be rejected");
}

#[tokio::test]
async fn test_playlist_positions_unique() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO playlists (user_id, name) VALUES (1, 'p')")
        .execute(&pool)
        .await
        .unwrap();
    for hash in ["a", "b"] {
        sqlx::query("INSERT INTO songs (content_hash, blob_key, modified_at) VALUES (?, ?, datetime('now'))")
            .bind(hash)
            .bind(hash)
            .execute(&pool)
            .await
            .unwrap();
    }

    sqlx::query("INSERT INTO playlist_songs (playlist_id, song_id, position) VALUES (1, 1, 1)")
        .execute(&pool)
        .await
        .unwrap();
    let err = sqlx::query("INSERT INTO playlist_songs (playlist_id, song_id, position) VALUES (1, 2, 1)")
        .execute(&pool)
        .await
        .unwrap_err();

    assert!(cadenza_common::Error::from(err).is_unique_violation());
}
