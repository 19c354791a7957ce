//! Metadata enrichment seam
//!
//! Enrichment is best-effort: callers log failures and carry on with the
//! file's own tags.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Enrichment unavailable")]
    Unavailable,
}

/// Corrections proposed for a song's tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correction {
    pub album: Option<String>,
    pub artist: Option<String>,
    pub year: Option<i32>,
}

/// Third-party metadata source
#[async_trait::async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Genre tags for an artist, in the service's own order
    async fn genres_for_artist(&self, artist: &str) -> Result<Vec<String>, EnrichmentError>;

    /// Album/artist/year correction for a track, if the service knows it
    async fn enrich(&self, artist: &str, title: &str) -> Result<Option<Correction>, EnrichmentError>;
}

/// Deterministic in-process provider
#[derive(Debug, Clone, Default)]
pub struct StaticEnrichment {
    genres: HashMap<String, Vec<String>>,
    corrections: HashMap<(String, String), Correction>,
    unavailable: bool,
}

impl StaticEnrichment {
    /// Provider that knows nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose every call fails
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_genres<I, S>(mut self, artist: &str, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres
            .insert(artist.to_string(), genres.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_correction(mut self, artist: &str, title: &str, correction: Correction) -> Self {
        self.corrections
            .insert((artist.to_string(), title.to_string()), correction);
        self
    }
}

#[async_trait::async_trait]
impl EnrichmentProvider for StaticEnrichment {
    async fn genres_for_artist(&self, artist: &str) -> Result<Vec<String>, EnrichmentError> {
        if self.unavailable {
            return Err(EnrichmentError::Unavailable);
        }
        Ok(self.genres.get(artist).cloned().unwrap_or_default())
    }

    async fn enrich(&self, artist: &str, title: &str) -> Result<Option<Correction>, EnrichmentError> {
        if self.unavailable {
            return Err(EnrichmentError::Unavailable);
        }
        Ok(self
            .corrections
            .get(&(artist.to_string(), title.to_string()))
            .cloned())
    }
}
