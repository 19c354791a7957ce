//! Per-file ingest errors
//!
//! Each variant is a stage whose failure aborts that file's pipeline.
//! Degraded stages (enrichment, embedding) never produce one.

use crate::services::blob_store::BlobError;
use crate::services::tag_reader::TagError;
use thiserror::Error;

/// Fatal failure of one file's pipeline
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("content hash failed: {0}")]
    Hash(#[source] cadenza_common::Error),

    #[error("dedup lookup failed: {0}")]
    Dedup(#[source] cadenza_common::Error),

    #[error("tag extraction failed: {0}")]
    Extract(#[source] TagError),

    #[error("blob placement failed: {0}")]
    Store(#[source] BlobError),

    #[error("genre resolution failed: {0}")]
    Genre(#[source] cadenza_common::Error),

    #[error("song persistence failed: {0}")]
    Persist(#[source] cadenza_common::Error),

    #[error("library link failed: {0}")]
    Link(#[source] cadenza_common::Error),

    #[error("playlist placement failed: {0}")]
    Playlist(#[source] cadenza_common::Error),
}

impl IngestError {
    /// Short stage code recorded in batch failure lists and events
    pub fn stage_code(&self) -> &'static str {
        match self {
            IngestError::Hash(_) => "hash",
            IngestError::Dedup(_) => "dedup",
            IngestError::Extract(_) => "extract",
            IngestError::Store(_) => "store",
            IngestError::Genre(_) => "genre",
            IngestError::Persist(_) => "persist",
            IngestError::Link(_) => "link",
            IngestError::Playlist(_) => "playlist",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_code_and_message() {
        let err = IngestError::Playlist(cadenza_common::Error::NotFound("Playlist 9".to_string()));
        assert_eq!(err.stage_code(), "playlist");
        assert_eq!(
            err.to_string(),
            "playlist placement failed: Not found: Playlist 9"
        );
    }
}
