//! Genre resolution
//!
//! Three stages, first hit wins:
//! 1. Enrichment genre tags for the song's artist (first tag as returned,
//!    even when blank)
//! 2. Trigram match of the file's parent folder name against the catalog
//! 3. The genre written in the file's own tags (possibly empty)

use crate::db::genres;
use crate::models::TrackTags;
use crate::services::enrichment::EnrichmentProvider;
use cadenza_common::Result;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

/// Minimum trigram similarity (exclusive) for a folder-name match
pub const TRIGRAM_THRESHOLD: f64 = 0.3;

pub struct GenreResolver {
    pool: SqlitePool,
    enrichment: Arc<dyn EnrichmentProvider>,
    threshold: f64,
}

impl GenreResolver {
    pub fn new(pool: SqlitePool, enrichment: Arc<dyn EnrichmentProvider>) -> Self {
        Self {
            pool,
            enrichment,
            threshold: TRIGRAM_THRESHOLD,
        }
    }

    /// Genre name for a song, empty when every stage comes up blank
    ///
    /// Errors only when the catalog query fails; "no match" is not an error.
    pub async fn resolve(&self, tags: &TrackTags, origin_path: &Path) -> Result<String> {
        if !tags.artist.is_empty() {
            match self.enrichment.genres_for_artist(&tags.artist).await {
                Ok(found) => {
                    if let Some(first) = found.into_iter().next() {
                        tracing::debug!(artist = %tags.artist, genre = %first, "Genre from enrichment");
                        return Ok(first);
                    }
                }
                Err(e) => {
                    tracing::warn!(artist = %tags.artist, error = %e, "Artist genre lookup failed");
                }
            }
        }

        if let Some(hint) = folder_hint(origin_path) {
            if let Some(genre) = genres::find_genre_by_trigram(&self.pool, hint, self.threshold).await? {
                tracing::debug!(folder = hint, genre = %genre, "Genre from folder name");
                return Ok(genre);
            }
        }

        Ok(tags.genre.clone())
    }
}

/// Parent directory name, skipping empty and `.`
fn folder_hint(path: &Path) -> Option<&str> {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::enrichment::StaticEnrichment;
    use cadenza_common::db::init_memory_database;

    fn tags(artist: &str, genre: &str) -> TrackTags {
        TrackTags {
            artist: artist.to_string(),
            genre: genre.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_folder_hint() {
        assert_eq!(folder_hint(Path::new("/up/electronica/x.mp3")), Some("electronica"));
        assert_eq!(folder_hint(Path::new("x.mp3")), None);
        assert_eq!(folder_hint(Path::new("./x.mp3")), None);
    }

    #[tokio::test]
    async fn test_enrichment_wins_over_folder_and_tag() {
        let pool = init_memory_database().await.unwrap();
        genres::find_or_create_genre(&pool, "Electronic").await.unwrap();
        let enrichment = StaticEnrichment::new().with_genres("Yes", ["Progressive Rock", "Rock"]);
        let resolver = GenreResolver::new(pool, Arc::new(enrichment));

        let genre = resolver
            .resolve(&tags("Yes", "Pop"), Path::new("/up/electronica/x.mp3"))
            .await
            .unwrap();
        assert_eq!(genre, "Progressive Rock");
    }

    #[tokio::test]
    async fn test_enrichment_failure_falls_through() {
        let pool = init_memory_database().await.unwrap();
        genres::find_or_create_genre(&pool, "Electronic").await.unwrap();
        let resolver = GenreResolver::new(pool, Arc::new(StaticEnrichment::unavailable()));

        let genre = resolver
            .resolve(&tags("Orbital", "Techno"), Path::new("/up/electronica/x.mp3"))
            .await
            .unwrap();
        assert_eq!(genre, "Electronic");
    }

    #[tokio::test]
    async fn test_tag_genre_is_last_resort() {
        let pool = init_memory_database().await.unwrap();
        genres::find_or_create_genre(&pool, "Jazz").await.unwrap();
        let resolver = GenreResolver::new(pool, Arc::new(StaticEnrichment::new()));

        let genre = resolver
            .resolve(&tags("", "Alternative"), Path::new("/up/Downloads/x.mp3"))
            .await
            .unwrap();
        assert_eq!(genre, "Alternative");

        let empty = resolver.resolve(&tags("", ""), Path::new("x.mp3")).await.unwrap();
        assert_eq!(empty, "");
    }

    #[tokio::test]
    async fn test_blank_first_enrichment_tag_is_taken() {
        let pool = init_memory_database().await.unwrap();
        genres::find_or_create_genre(&pool, "Electronic").await.unwrap();
        let enrichment = StaticEnrichment::new().with_genres("Orbital", ["", "Techno"]);
        let resolver = GenreResolver::new(pool, Arc::new(enrichment));

        let genre = resolver
            .resolve(&tags("Orbital", "House"), Path::new("/up/electronica/x.mp3"))
            .await
            .unwrap();
        assert_eq!(genre, "");
    }
}
