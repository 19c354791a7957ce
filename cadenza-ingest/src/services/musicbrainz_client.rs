//! MusicBrainz web-service client
//!
//! Artist genre tags and release-based album/artist/year corrections,
//! rate limited to one request per second as the service requires.

use super::enrichment::{Correction, EnrichmentError, EnrichmentProvider};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const RATE_LIMIT_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct ArtistSearch {
    #[serde(default)]
    artists: Vec<MBArtist>,
}

#[derive(Debug, Deserialize)]
struct MBArtist {
    name: String,
    #[serde(default)]
    tags: Vec<MBTag>,
}

#[derive(Debug, Deserialize)]
struct MBTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseSearch {
    #[serde(default)]
    releases: Vec<MBRelease>,
}

#[derive(Debug, Deserialize)]
struct MBRelease {
    title: String,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MBArtistCredit>,
}

#[derive(Debug, Deserialize)]
struct MBArtistCredit {
    name: String,
}

/// Rate limiter enforcing a minimum interval between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl MusicBrainzClient {
    /// `contact_email` goes into the User-Agent, which MusicBrainz requires
    pub fn new(base_url: &str, contact_email: &str, timeout: Duration) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent(contact_email))
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    async fn search<T: serde::de::DeserializeOwned>(
        &self,
        entity: &str,
        query: &str,
    ) -> Result<T, EnrichmentError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/{}", self.base_url, entity);
        tracing::debug!(url = %url, query = %query, "Querying MusicBrainz");

        let response = self
            .http_client
            .get(&url)
            .query(&[("query", query), ("limit", "1"), ("fmt", "json")])
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 503 {
            return Err(EnrichmentError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl EnrichmentProvider for MusicBrainzClient {
    async fn genres_for_artist(&self, artist: &str) -> Result<Vec<String>, EnrichmentError> {
        if artist.trim().is_empty() {
            return Ok(Vec::new());
        }

        let found: ArtistSearch = self.search("artist", &artist_query(artist)).await?;
        let genres = artist_genres(found);

        tracing::debug!(artist, genres = ?genres, "MusicBrainz artist genres");
        Ok(genres)
    }

    async fn enrich(&self, artist: &str, title: &str) -> Result<Option<Correction>, EnrichmentError> {
        if artist.trim().is_empty() || title.trim().is_empty() {
            return Ok(None);
        }

        let found: ReleaseSearch = self.search("release", &release_query(artist, title)).await?;
        Ok(release_correction(found))
    }
}

fn user_agent(contact_email: &str) -> String {
    format!("Cadenza/{} ( {} )", env!("CARGO_PKG_VERSION"), contact_email)
}

/// Lucene phrase with embedded quotes and backslashes escaped
fn phrase(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn artist_query(artist: &str) -> String {
    format!("artist:{}", phrase(artist))
}

fn release_query(artist: &str, title: &str) -> String {
    format!("release:{} AND artist:{}", phrase(title), phrase(artist))
}

fn artist_genres(found: ArtistSearch) -> Vec<String> {
    found
        .artists
        .into_iter()
        .next()
        .map(|artist| {
            tracing::trace!(matched = %artist.name, tags = artist.tags.len(), "Best artist match");
            artist.tags.into_iter().map(|t| t.name).collect()
        })
        .unwrap_or_default()
}

fn release_correction(found: ReleaseSearch) -> Option<Correction> {
    let release = found.releases.into_iter().next()?;

    let year = release
        .date
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<i32>().ok())
        .filter(|y| *y > 0);

    Some(Correction {
        album: Some(release.title).filter(|t| !t.is_empty()),
        artist: release
            .artist_credit
            .into_iter()
            .next()
            .map(|credit| credit.name)
            .filter(|n| !n.is_empty()),
        year,
    })
}
