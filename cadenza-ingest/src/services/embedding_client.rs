//! Audio embedding providers
//!
//! The live client posts the raw audio to a feature-extraction service
//! (`POST {base}/process-audio/`, multipart field `file`) and expects
//! `{"embedding": [f64, ...]}` back.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding service timed out")]
    Timeout,

    #[error("Embedding service returned {0}: {1}")]
    Status(u16, String),

    #[error("Malformed embedding: {0}")]
    Malformed(String),
}

/// Raw audio in, fixed-dimension vector out
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, audio: &Path, content_type: &str) -> Result<Vec<f64>, EmbeddingError>;
}

/// Reject vectors that cannot be ranked
pub fn validate_vector(vector: &[f64]) -> Result<(), EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::Malformed("empty vector".to_string()));
    }
    if let Some(i) = vector.iter().position(|v| !v.is_finite()) {
        return Err(EmbeddingError::Malformed(format!("non-finite value at index {}", i)));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

/// HTTP client for the feature-extraction service
pub struct HttpEmbeddingClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpEmbeddingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EmbeddingError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/process-audio/", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn request_error(e: reqwest::Error) -> EmbeddingError {
    if e.is_timeout() {
        EmbeddingError::Timeout
    } else {
        EmbeddingError::Network(e.to_string())
    }
}

fn parse_response(body: &str) -> Result<Vec<f64>, EmbeddingError> {
    let parsed: EmbeddingResponse =
        serde_json::from_str(body).map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
    validate_vector(&parsed.embedding)?;
    Ok(parsed.embedding)
}

#[async_trait::async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, audio: &Path, content_type: &str) -> Result<Vec<f64>, EmbeddingError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::debug!(endpoint = %self.endpoint, file = %audio.display(), "Requesting embedding");

        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(request_error)?;
        if !status.is_success() {
            return Err(EmbeddingError::Status(status.as_u16(), body));
        }

        let vector = parse_response(&body)?;
        tracing::debug!(dimension = vector.len(), "Received embedding");
        Ok(vector)
    }
}

/// Deterministic in-process embedder
///
/// Vectors derive from the file bytes, so identical content embeds
/// identically. Specific file names can be pinned to fixed vectors.
#[derive(Debug, Default)]
pub struct StaticEmbedder {
    dimension: usize,
    pinned: HashMap<String, Vec<f64>>,
    failing: bool,
    calls: AtomicUsize,
}

impl StaticEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// Embedder whose every call fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Return `vector` for any file named `file_name`
    pub fn with_vector(mut self, file_name: &str, vector: Vec<f64>) -> Self {
        self.pinned.insert(file_name.to_string(), vector);
        self
    }

    /// Number of embed calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed(&self, audio: &Path, _content_type: &str) -> Result<Vec<f64>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing {
            return Err(EmbeddingError::Status(503, "embedder offline".to_string()));
        }

        if let Some(vector) = audio
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.pinned.get(n))
        {
            return Ok(vector.clone());
        }

        let bytes = tokio::fs::read(audio).await?;
        let digest = Sha256::digest(&bytes);
        let vector = (0..self.dimension)
            .map(|i| (digest[i % digest.len()] as f64 + 1.0) / 256.0)
            .collect::<Vec<_>>();

        validate_vector(&vector)?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let vector = parse_response(r#"{"embedding": [0.5, -1.25, 3.0]}"#).unwrap();
        assert_eq!(vector, vec![0.5, -1.25, 3.0]);
    }

    #[test]
    fn test_malformed_responses() {
        assert!(matches!(
            parse_response(r#"{"embedding": []}"#),
            Err(EmbeddingError::Malformed(_))
        ));
        assert!(matches!(
            parse_response(r#"{"vector": [1.0]}"#),
            Err(EmbeddingError::Malformed(_))
        ));
        assert!(matches!(
            parse_response("<html>bad gateway</html>"),
            Err(EmbeddingError::Malformed(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        assert!(validate_vector(&[1.0, f64::NAN]).is_err());
        assert!(validate_vector(&[f64::INFINITY]).is_err());
        assert!(validate_vector(&[0.0, 0.1]).is_ok());
    }

    #[test]
    fn test_endpoint_from_base_url() {
        let client = HttpEmbeddingClient::new("http://embedder:8000/", Duration::from_secs(60)).unwrap();
        assert_eq!(client.endpoint(), "http://embedder:8000/process-audio/");
    }

    #[tokio::test]
    async fn test_static_embedder_is_content_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        let c = dir.path().join("c.mp3");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        std::fs::write(&c, b"different").unwrap();

        let embedder = StaticEmbedder::new(8).with_vector("c.mp3", vec![1.0, 0.0]);
        let va = embedder.embed(&a, "audio/mpeg").await.unwrap();
        let vb = embedder.embed(&b, "audio/mpeg").await.unwrap();
        let vc = embedder.embed(&c, "audio/mpeg").await.unwrap();

        assert_eq!(va.len(), 8);
        assert_eq!(va, vb);
        assert_eq!(vc, vec![1.0, 0.0]);
        assert_eq!(embedder.calls(), 3);
    }
}
