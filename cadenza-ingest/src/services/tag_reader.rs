//! Audio tag extraction
//!
//! Reads title, artist, album, year, genre, duration and bitrate with lofty.
//! Missing tags are not an error; an unreadable container is.

use crate::models::TrackTags;
use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::Path;
use thiserror::Error;

/// Tag extraction errors
#[derive(Debug, Error)]
pub enum TagError {
    /// File is not a readable audio container
    #[error("Failed to read tags: {0}")]
    Read(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File in, tag fields out
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<TrackTags, TagError>;
}

/// lofty-backed reader
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl LoftyTagReader {
    pub fn new() -> Self {
        Self
    }
}

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Result<TrackTags, TagError> {
        if !path.is_file() {
            return Err(TagError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a file", path.display()),
            )));
        }

        let tagged_file = Probe::open(path)
            .map_err(|e| TagError::Read(e.to_string()))?
            .read()
            .map_err(|e| TagError::Read(e.to_string()))?;

        let properties = tagged_file.properties();
        let mut tags = TrackTags {
            duration_ms: properties.duration().as_millis() as i64,
            bitrate_kbps: properties.audio_bitrate().unwrap_or(0) as i64,
            ..Default::default()
        };

        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            tags.title = tag.title().map(|s| s.trim().to_string()).unwrap_or_default();
            tags.artist = tag.artist().map(|s| s.trim().to_string()).unwrap_or_default();
            tags.album = tag.album().map(|s| s.trim().to_string()).unwrap_or_default();
            tags.genre = tag.genre().map(|s| s.trim().to_string()).unwrap_or_default();
            tags.year = tag.year().map(|y| y as i32).unwrap_or(0);
        }

        tracing::debug!(
            file = %path.display(),
            title = %tags.title,
            artist = %tags.artist,
            duration_ms = tags.duration_ms,
            "Extracted tags"
        );

        Ok(tags)
    }
}
