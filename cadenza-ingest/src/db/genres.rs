//! Genre catalog operations

use crate::models::GenreId;
use crate::utils::{retry_on_lock, trigram, DEFAULT_MAX_LOCK_WAIT_MS};
use cadenza_common::Result;
use sqlx::SqlitePool;

/// Look up a genre by name, creating it if absent
///
/// Single statement: concurrent first resolutions of the same name converge
/// on one row through the UNIQUE constraint.
pub async fn find_or_create_genre(pool: &SqlitePool, name: &str) -> Result<GenreId> {
    retry_on_lock("find_or_create_genre", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO genres (name) VALUES (?)
            ON CONFLICT(name) DO UPDATE SET name = excluded.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(pool)
        .await?;

        Ok(id)
    })
    .await
}

/// All genre names in name order
pub async fn list_genre_names(pool: &SqlitePool) -> Result<Vec<String>> {
    let names = sqlx::query_scalar("SELECT name FROM genres ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(names)
}

pub async fn genre_name(pool: &SqlitePool, genre_id: GenreId) -> Result<Option<String>> {
    let name = sqlx::query_scalar("SELECT name FROM genres WHERE id = ?")
        .bind(genre_id)
        .fetch_optional(pool)
        .await?;

    Ok(name)
}

/// Best trigram match for `hint` scoring strictly above `threshold`
///
/// Equal scores keep the first name in catalog order.
pub async fn find_genre_by_trigram(
    pool: &SqlitePool,
    hint: &str,
    threshold: f64,
) -> Result<Option<String>> {
    let names = list_genre_names(pool).await?;

    let mut best: Option<(f64, String)> = None;
    for name in names {
        let score = trigram::similarity(hint, &name);
        if score <= threshold {
            continue;
        }
        match &best {
            Some((best_score, _)) if score <= *best_score => {}
            _ => best = Some((score, name)),
        }
    }

    if let Some((score, name)) = &best {
        tracing::debug!(hint, genre = %name, score, "Trigram genre match");
    }

    Ok(best.map(|(_, name)| name))
}
