//! Embedding persistence and nearest-neighbor queries
//!
//! Similarity is cosine similarity computed in process over every stored
//! vector. Results are ordered by descending similarity, then ascending
//! song id.

use crate::db::{embeddings, songs};
use crate::models::{SimilarSong, SongId};
use crate::services::embedding_client::validate_vector;
use sqlx::SqlitePool;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("Song not found: {0}")]
    SongNotFound(SongId),

    #[error("No embedding stored for song {0}")]
    NoEmbedding(SongId),

    #[error("Invalid query vector: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Database(#[from] cadenza_common::Error),
}

/// Cosine similarity; `None` for mismatched lengths or a zero vector
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[derive(Clone)]
pub struct EmbeddingStore {
    pool: SqlitePool,
}

impl EmbeddingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert the vector for a song
    pub async fn save_embedding(&self, song_id: SongId, vector: &[f64]) -> cadenza_common::Result<()> {
        embeddings::save_embedding(&self.pool, song_id, vector).await
    }

    pub async fn embedding(&self, song_id: SongId) -> cadenza_common::Result<Option<Vec<f64>>> {
        embeddings::load_embedding(&self.pool, song_id).await
    }

    /// Up to `top_n` songs other than `exclude` ranked against `query`
    ///
    /// An empty result is a success. Stored vectors with a different
    /// dimension or zero norm are skipped.
    pub async fn find_similar(
        &self,
        exclude: SongId,
        query: &[f64],
        top_n: usize,
    ) -> Result<Vec<SimilarSong>, SimilarityError> {
        validate_vector(query).map_err(|e| SimilarityError::InvalidQuery(e.to_string()))?;
        if query.iter().all(|v| *v == 0.0) {
            return Err(SimilarityError::InvalidQuery("zero vector".to_string()));
        }
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let candidates = embeddings::load_embeddings_except(&self.pool, exclude).await?;

        let mut scored: Vec<SimilarSong> = candidates
            .into_iter()
            .filter_map(|row| match cosine_similarity(query, &row.vector) {
                Some(similarity) => Some(SimilarSong {
                    song_id: row.song_id,
                    title: row.title,
                    artist: row.artist,
                    similarity,
                }),
                None => {
                    tracing::warn!(
                        song_id = row.song_id,
                        dimension = row.vector.len(),
                        expected = query.len(),
                        "Skipping unrankable embedding"
                    );
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then(a.song_id.cmp(&b.song_id))
        });
        scored.truncate(top_n);

        Ok(scored)
    }

    /// Songs similar to a stored song
    pub async fn similar_to_song(
        &self,
        song_id: SongId,
        top_n: usize,
    ) -> Result<Vec<SimilarSong>, SimilarityError> {
        if !songs::song_exists(&self.pool, song_id).await? {
            return Err(SimilarityError::SongNotFound(song_id));
        }

        let query = self
            .embedding(song_id)
            .await?
            .ok_or(SimilarityError::NoEmbedding(song_id))?;

        self.find_similar(song_id, &query, top_n).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), Some(-1.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
    }

    #[tokio::test]
    async fn test_invalid_query_vectors() {
        let pool = cadenza_common::db::init_memory_database().await.unwrap();
        let store = EmbeddingStore::new(pool);

        assert!(matches!(
            store.find_similar(1, &[], 5).await,
            Err(SimilarityError::InvalidQuery(_))
        ));
        assert!(matches!(
            store.find_similar(1, &[0.0, 0.0], 5).await,
            Err(SimilarityError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_similar_to_unknown_song() {
        let pool = cadenza_common::db::init_memory_database().await.unwrap();
        let store = EmbeddingStore::new(pool);

        assert!(matches!(
            store.similar_to_song(42, 5).await,
            Err(SimilarityError::SongNotFound(42))
        ));
    }
}
