//! Playlist catalog and position storage
//!
//! Position mutations take a connection so the playlist manager can run them
//! inside one transaction. SQLite enforces the (playlist, position) unique
//! index row by row, so shifts move rows through negative positions first.

use super::songs::{song_columns, song_from_row};
use crate::models::{Playlist, PlaylistEntry, PlaylistId, PlaylistSummary, SongId, UserId};
use cadenza_common::{Error, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

fn playlist_from_row(row: &SqliteRow) -> Result<Playlist> {
    Ok(Playlist {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn create_playlist(pool: &SqlitePool, user_id: UserId, name: &str) -> Result<Playlist> {
    let now = Utc::now();
    let row = sqlx::query(
        r#"
        INSERT INTO playlists (user_id, name, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, user_id, name, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    playlist_from_row(&row)
}

/// Owner's playlists, newest first, with entry counts
pub async fn list_playlists(pool: &SqlitePool, user_id: UserId) -> Result<Vec<PlaylistSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.user_id, p.name, p.created_at, p.updated_at,
               COUNT(ps.song_id) AS song_count
        FROM playlists p
        LEFT JOIN playlist_songs ps ON ps.playlist_id = p.id
        WHERE p.user_id = ?
        GROUP BY p.id
        ORDER BY p.created_at DESC, p.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<PlaylistSummary> {
            Ok(PlaylistSummary {
                playlist: playlist_from_row(row)?,
                song_count: row.try_get("song_count")?,
            })
        })
        .collect()
}

/// Playlist owned by `user_id`, NotFound otherwise
pub async fn get_playlist(pool: &SqlitePool, user_id: UserId, playlist_id: PlaylistId) -> Result<Playlist> {
    let row = sqlx::query(
        "SELECT id, user_id, name, created_at, updated_at FROM playlists WHERE id = ? AND user_id = ?",
    )
    .bind(playlist_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => playlist_from_row(&row),
        None => Err(Error::NotFound(format!("Playlist {}", playlist_id))),
    }
}

/// Rename a playlist owned by `user_id`, returning the updated row
pub async fn rename_playlist(
    pool: &SqlitePool,
    user_id: UserId,
    playlist_id: PlaylistId,
    name: &str,
) -> Result<Playlist> {
    let row = sqlx::query(
        r#"
        UPDATE playlists SET name = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        RETURNING id, user_id, name, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(Utc::now())
    .bind(playlist_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => playlist_from_row(&row),
        None => Err(Error::NotFound(format!("Playlist {}", playlist_id))),
    }
}

/// Delete a playlist; entries go with it (ON DELETE CASCADE)
pub async fn delete_playlist(pool: &SqlitePool, user_id: UserId, playlist_id: PlaylistId) -> Result<()> {
    let result = sqlx::query("DELETE FROM playlists WHERE id = ? AND user_id = ?")
        .bind(playlist_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Playlist {}", playlist_id)));
    }
    Ok(())
}

/// Entries ordered by position, with full song rows and genre names
pub async fn playlist_entries(pool: &SqlitePool, playlist_id: PlaylistId) -> Result<Vec<PlaylistEntry>> {
    let rows = sqlx::query(&format!(
        "SELECT {}, g.name AS genre_name, ps.position \
         FROM playlist_songs ps \
         JOIN songs s ON s.id = ps.song_id \
         LEFT JOIN genres g ON g.id = s.genre_id \
         WHERE ps.playlist_id = ? \
         ORDER BY ps.position",
        song_columns()
    ))
    .bind(playlist_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<PlaylistEntry> {
            Ok(PlaylistEntry {
                song: song_from_row(row)?,
                genre: row.try_get("genre_name")?,
                position: row.try_get("position")?,
            })
        })
        .collect()
}

pub async fn playlist_exists(conn: &mut SqliteConnection, playlist_id: PlaylistId) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM playlists WHERE id = ?")
        .bind(playlist_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

pub async fn entry_position(
    conn: &mut SqliteConnection,
    playlist_id: PlaylistId,
    song_id: SongId,
) -> Result<Option<i64>> {
    let position = sqlx::query_scalar(
        "SELECT position FROM playlist_songs WHERE playlist_id = ? AND song_id = ?",
    )
    .bind(playlist_id)
    .bind(song_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(position)
}

pub async fn entry_count(conn: &mut SqliteConnection, playlist_id: PlaylistId) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM playlist_songs WHERE playlist_id = ?")
        .bind(playlist_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

/// Highest position in use, 0 when empty
pub async fn max_position(conn: &mut SqliteConnection, playlist_id: PlaylistId) -> Result<i64> {
    let max = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), 0) FROM playlist_songs WHERE playlist_id = ?",
    )
    .bind(playlist_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(max)
}

pub async fn delete_entry(
    conn: &mut SqliteConnection,
    playlist_id: PlaylistId,
    song_id: SongId,
) -> Result<()> {
    sqlx::query("DELETE FROM playlist_songs WHERE playlist_id = ? AND song_id = ?")
        .bind(playlist_id)
        .bind(song_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn insert_entry(
    conn: &mut SqliteConnection,
    playlist_id: PlaylistId,
    song_id: SongId,
    position: i64,
) -> Result<()> {
    sqlx::query("INSERT INTO playlist_songs (playlist_id, song_id, position) VALUES (?, ?, ?)")
        .bind(playlist_id)
        .bind(song_id)
        .bind(position)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Open a gap: every position >= `from` moves up by one
pub async fn shift_up_from(conn: &mut SqliteConnection, playlist_id: PlaylistId, from: i64) -> Result<()> {
    sqlx::query(
        "UPDATE playlist_songs SET position = -(position + 1) WHERE playlist_id = ? AND position >= ?",
    )
    .bind(playlist_id)
    .bind(from)
    .execute(&mut *conn)
    .await?;

    flip_negative_positions(conn, playlist_id).await
}

/// Close a gap: every position > `after` moves down by one
pub async fn shift_down_after(conn: &mut SqliteConnection, playlist_id: PlaylistId, after: i64) -> Result<()> {
    sqlx::query(
        "UPDATE playlist_songs SET position = -(position - 1) WHERE playlist_id = ? AND position > ?",
    )
    .bind(playlist_id)
    .bind(after)
    .execute(&mut *conn)
    .await?;

    flip_negative_positions(conn, playlist_id).await
}

async fn flip_negative_positions(conn: &mut SqliteConnection, playlist_id: PlaylistId) -> Result<()> {
    sqlx::query("UPDATE playlist_songs SET position = -position WHERE playlist_id = ? AND position < 0")
        .bind(playlist_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn touch_playlist(conn: &mut SqliteConnection, playlist_id: PlaylistId) -> Result<()> {
    sqlx::query("UPDATE playlists SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(playlist_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_common::db::init_memory_database;

    #[tokio::test]
    async fn test_catalog_ownership() {
        let pool = init_memory_database().await.unwrap();

        let mine = create_playlist(&pool, 1, "Road trip").await.unwrap();
        create_playlist(&pool, 2, "Not mine").await.unwrap();

        assert_eq!(get_playlist(&pool, 1, mine.id).await.unwrap().name, "Road trip");
        assert!(matches!(
            get_playlist(&pool, 2, mine.id).await,
            Err(Error::NotFound(_))
        ));

        let renamed = rename_playlist(&pool, 1, mine.id, "Night drive").await.unwrap();
        assert_eq!(renamed.name, "Night drive");
        assert_eq!(renamed.created_at, mine.created_at);
        assert!(matches!(
            rename_playlist(&pool, 2, mine.id, "Hijack").await,
            Err(Error::NotFound(_))
        ));

        let listed = list_playlists(&pool, 1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].playlist.name, "Night drive");
        assert_eq!(listed[0].song_count, 0);

        delete_playlist(&pool, 1, mine.id).await.unwrap();
        assert!(matches!(
            delete_playlist(&pool, 1, mine.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_shift_keeps_unique_positions() {
        let pool = init_memory_database().await.unwrap();
        let playlist = create_playlist(&pool, 1, "Shifts").await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        for (i, hash) in ["s1", "s2", "s3"].iter().enumerate() {
            let song: i64 = sqlx::query_scalar(
                "INSERT INTO songs (content_hash, blob_key, modified_at) VALUES (?, ?, datetime('now')) RETURNING id",
            )
            .bind(*hash)
            .bind(*hash)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
            insert_entry(&mut conn, playlist.id, song, i as i64 + 1).await.unwrap();
        }

        shift_up_from(&mut conn, playlist.id, 2).await.unwrap();
        let positions: Vec<i64> = sqlx::query_scalar(
            "SELECT position FROM playlist_songs WHERE playlist_id = ? ORDER BY position",
        )
        .bind(playlist.id)
        .fetch_all(&mut *conn)
        .await
        .unwrap();
        assert_eq!(positions, vec![1, 3, 4]);

        shift_down_after(&mut conn, playlist.id, 1).await.unwrap();
        assert_eq!(max_position(&mut conn, playlist.id).await.unwrap(), 3);
        assert_eq!(entry_count(&mut conn, playlist.id).await.unwrap(), 3);
        drop(conn);

        let entries = playlist_entries(&pool, playlist.id).await.unwrap();
        let positions: Vec<i64> = entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }
}
