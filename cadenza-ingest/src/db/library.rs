//! User library links and ratings

use super::songs::{song_columns, song_from_row};
use crate::models::{LibraryFilter, LibrarySong, LibrarySort, SongId, UserId};
use cadenza_common::Result;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

/// Link a song to a user; an existing link is left untouched
pub async fn add_user_song(pool: &SqlitePool, user_id: UserId, song_id: SongId) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_songs (user_id, song_id, added_at) VALUES (?, ?, ?)
        ON CONFLICT(user_id, song_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(song_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Set a rating, creating the link if needed
pub async fn rate_song(pool: &SqlitePool, user_id: UserId, song_id: SongId, rating: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_songs (user_id, song_id, rating, added_at) VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id, song_id) DO UPDATE SET rating = excluded.rating
        "#,
    )
    .bind(user_id)
    .bind(song_id)
    .bind(rating)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns true when a link was removed
pub async fn remove_user_song(pool: &SqlitePool, user_id: UserId, song_id: SongId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM user_songs WHERE user_id = ? AND song_id = ?")
        .bind(user_id)
        .bind(song_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn user_has_song(pool: &SqlitePool, user_id: UserId, song_id: SongId) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM user_songs WHERE user_id = ? AND song_id = ?")
            .bind(user_id)
            .bind(song_id)
            .fetch_optional(pool)
            .await?;

    Ok(found.is_some())
}

/// Songs in a user's library with genre name and rating
pub async fn library_songs(
    pool: &SqlitePool,
    user_id: UserId,
    filter: &LibraryFilter,
    sort: LibrarySort,
) -> Result<Vec<LibrarySong>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {}, g.name AS genre_name, us.rating, us.added_at \
         FROM user_songs us \
         JOIN songs s ON s.id = us.song_id \
         LEFT JOIN genres g ON g.id = s.genre_id \
         WHERE us.user_id = ",
        song_columns()
    ));
    qb.push_bind(user_id);

    for (column, value) in [
        ("s.title", &filter.title),
        ("s.artist", &filter.artist),
        ("s.album", &filter.album),
        ("g.name", &filter.genre),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            qb.push(format!(" AND instr(lower(COALESCE({}, '')), lower(", column));
            qb.push_bind(value.to_string());
            qb.push(")) > 0");
        }
    }

    if let Some(year) = filter.year {
        qb.push(" AND s.year = ");
        qb.push_bind(year);
    }

    qb.push(format!(
        " ORDER BY {} {}, s.id ASC",
        sort.field.column(),
        sort.order.keyword()
    ));

    let rows = qb.build().fetch_all(pool).await?;

    rows.iter()
        .map(|row| -> Result<LibrarySong> {
            Ok(LibrarySong {
                song: song_from_row(row)?,
                genre: row.try_get("genre_name")?,
                rating: row.try_get("rating")?,
                added_at: row.try_get("added_at")?,
            })
        })
        .collect()
}
