//! Song embedding storage
//!
//! Vectors are stored as JSON arrays next to their dimension.

use crate::models::SongId;
use cadenza_common::{Error, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Stored embedding joined with the song's display fields
#[derive(Debug, Clone)]
pub struct EmbeddingRow {
    pub song_id: SongId,
    pub title: String,
    pub artist: String,
    pub vector: Vec<f64>,
}

/// Upsert: a later vector for the same song replaces the earlier one
pub async fn save_embedding(pool: &SqlitePool, song_id: SongId, vector: &[f64]) -> Result<()> {
    let encoded = serde_json::to_string(vector)
        .map_err(|e| Error::Internal(format!("Embedding encode failed: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO song_embeddings (song_id, dimension, embedding, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(song_id) DO UPDATE SET
            dimension = excluded.dimension,
            embedding = excluded.embedding,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(song_id)
    .bind(vector.len() as i64)
    .bind(encoded)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_embedding(pool: &SqlitePool, song_id: SongId) -> Result<Option<Vec<f64>>> {
    let encoded: Option<String> =
        sqlx::query_scalar("SELECT embedding FROM song_embeddings WHERE song_id = ?")
            .bind(song_id)
            .fetch_optional(pool)
            .await?;

    encoded.map(|text| decode(song_id, &text)).transpose()
}

/// Every stored embedding except `exclude`
///
/// Rows that fail to decode are logged and left out.
pub async fn load_embeddings_except(pool: &SqlitePool, exclude: SongId) -> Result<Vec<EmbeddingRow>> {
    let rows = sqlx::query(
        r#"
        SELECT e.song_id, e.embedding, s.title, s.artist
        FROM song_embeddings e
        JOIN songs s ON s.id = e.song_id
        WHERE e.song_id != ?
        ORDER BY e.song_id
        "#,
    )
    .bind(exclude)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let song_id: SongId = row.try_get("song_id")?;
        let text: String = row.try_get("embedding")?;
        match decode(song_id, &text) {
            Ok(vector) => out.push(EmbeddingRow {
                song_id,
                title: row.try_get("title")?,
                artist: row.try_get("artist")?,
                vector,
            }),
            Err(e) => tracing::warn!(song_id, error = %e, "Skipping undecodable embedding"),
        }
    }

    Ok(out)
}

fn decode(song_id: SongId, text: &str) -> Result<Vec<f64>> {
    serde_json::from_str(text)
        .map_err(|e| Error::Internal(format!("Embedding for song {} is corrupt: {}", song_id, e)))
}
