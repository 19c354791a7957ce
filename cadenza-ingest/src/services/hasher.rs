//! Content hashing
//!
//! The SHA-256 of a file's full bytes is its identity in the library.

use cadenza_common::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

const CHUNK_SIZE: usize = 1024 * 1024;

/// SHA-256 of the file content, lowercase hex
pub async fn hash_file(file_path: &Path) -> Result<String> {
    let path_buf = file_path.to_path_buf();

    let hash = tokio::task::spawn_blocking(move || -> Result<String> {
        use std::fs::File;
        use std::io::Read;

        let mut file = File::open(&path_buf).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {} for hashing: {}", path_buf.display(), e),
            ))
        })?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| Error::Internal(format!("Hash calculation task failed: {}", e)))??;

    tracing::debug!(file = %file_path.display(), hash = %hash, "Calculated content hash");

    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_known_digest() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();

        let hash = hash_file(file.path()).await.unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_identical_content_identical_hash() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("nested_b.flac");
        std::fs::write(&a, vec![7u8; 3 * CHUNK_SIZE + 11]).unwrap();
        std::fs::write(&b, vec![7u8; 3 * CHUNK_SIZE + 11]).unwrap();

        assert_eq!(hash_file(&a).await.unwrap(), hash_file(&b).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = hash_file(Path::new("/definitely/not/here.mp3")).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
