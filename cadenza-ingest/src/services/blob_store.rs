//! Durable blob storage for song audio
//!
//! Keys are `<sha256><.ext>`, derived from content, so placing the same
//! content twice is a no-op.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BlobError> for cadenza_common::Error {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(key) => cadenza_common::Error::NotFound(format!("Blob {}", key)),
            BlobError::InvalidKey(key) => cadenza_common::Error::InvalidInput(format!("Blob key {}", key)),
            BlobError::Io(e) => cadenza_common::Error::Io(e),
        }
    }
}

/// Seekable blob content
pub trait BlobReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> BlobReader for T {}

/// Object store keyed by content-derived keys
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `size` bytes from `reader` under `key`
    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
        content_type: &str,
    ) -> Result<(), BlobError>;

    /// Open a stored blob for (seekable) streaming
    async fn get(&self, key: &str) -> Result<Box<dyn BlobReader>, BlobError>;

    async fn exists(&self, key: &str) -> Result<bool, BlobError>;
}

/// Blob key for content: hash plus the original extension, lowercased
pub fn blob_key(content_hash: &str, original: &Path) -> String {
    match original.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", content_hash, ext.to_lowercase()),
        _ => content_hash.to_string(),
    }
}

/// Local filesystem store
///
/// Blobs live at `<root>/<first two key chars>/<key>`. Writes go through a
/// temporary file and a rename so readers never observe partial content.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        let valid = key.len() >= 2
            && !key.starts_with('.')
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '.');
        if !valid {
            return Err(BlobError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(&key[..2]).join(key))
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
        content_type: &str,
    ) -> Result<(), BlobError> {
        let path = self.blob_path(key)?;

        if fs::try_exists(&path).await? {
            tracing::debug!(key, "Blob already stored");
            return Ok(());
        }

        let parent = path
            .parent()
            .ok_or_else(|| BlobError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent).await?;

        let tmp_path = parent.join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));
        let written = async {
            let mut out = fs::File::create(&tmp_path).await?;
            let copied = tokio::io::copy(&mut *reader, &mut out).await?;
            out.flush().await?;
            out.sync_all().await?;
            Ok::<u64, std::io::Error>(copied)
        }
        .await;

        let copied = match written {
            Ok(copied) => copied,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(e.into());
            }
        };

        if copied != size {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes for {}, copied {}", size, key, copied),
            )));
        }

        // Concurrent writers of the same key carry identical bytes; last
        // rename wins harmlessly.
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::debug!(key, bytes = copied, content_type, "Stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Box<dyn BlobReader>, BlobError> {
        let path = self.blob_path(key)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.blob_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    #[test]
    fn test_blob_key_lowercases_extension() {
        assert_eq!(blob_key("abc123", Path::new("/tmp/Song.MP3")), "abc123.mp3");
        assert_eq!(blob_key("abc123", Path::new("/tmp/noext")), "abc123");
    }

    #[tokio::test]
    async fn test_put_get_roundtrip_and_seek() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let data = b"0123456789".to_vec();

        store
            .put("ab12.wav", &mut data.as_slice(), data.len() as u64, "audio/wav")
            .await
            .unwrap();
        assert!(store.exists("ab12.wav").await.unwrap());
        assert!(dir.path().join("ab").join("ab12.wav").is_file());

        let mut reader = store.get("ab12.wav").await.unwrap();
        reader.seek(std::io::SeekFrom::Start(6)).await.unwrap();
        let mut tail = String::new();
        reader.read_to_string(&mut tail).await.unwrap();
        assert_eq!(tail, "6789");
    }

    #[tokio::test]
    async fn test_second_put_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("cd34.mp3", &mut &b"first"[..], 5, "audio/mpeg").await.unwrap();
        store.put("cd34.mp3", &mut &b"other"[..], 5, "audio/mpeg").await.unwrap();

        let stored = std::fs::read(dir.path().join("cd").join("cd34.mp3")).unwrap();
        assert_eq!(stored, b"first");
    }

    #[tokio::test]
    async fn test_missing_and_invalid_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        assert!(matches!(store.get("ef56.ogg").await, Err(BlobError::NotFound(_))));
        assert!(matches!(store.get("../etc/passwd").await, Err(BlobError::InvalidKey(_))));
        assert!(!store.exists("ef56.ogg").await.unwrap());
    }

    #[tokio::test]
    async fn test_short_stream_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let result = store.put("aa99.mp3", &mut &b"abc"[..], 10, "audio/mpeg").await;
        assert!(matches!(result, Err(BlobError::Io(_))));
        assert!(!store.exists("aa99.mp3").await.unwrap());
    }
}
