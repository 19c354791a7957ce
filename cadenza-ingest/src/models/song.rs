//! Song records and ingest results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SongId = i64;
pub type UserId = i64;
pub type PlaylistId = i64;
pub type GenreId = i64;

/// Tag fields read from an audio file
///
/// Absent fields are empty strings or zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: i32,
    /// Genre as written in the file's own tags
    pub genre: String,
    pub duration_ms: i64,
    pub bitrate_kbps: i64,
}

/// Song row about to be inserted
#[derive(Debug, Clone)]
pub struct NewSong {
    pub content_hash: String,
    pub blob_key: String,
    pub content_type: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: i32,
    pub genre_id: Option<GenreId>,
    pub duration_ms: i64,
    pub bitrate_kbps: i64,
    pub file_size_bytes: i64,
    pub modified_at: DateTime<Utc>,
}

/// Persisted song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    /// SHA-256 of the file content, lowercase hex
    pub content_hash: String,
    pub blob_key: String,
    pub content_type: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: i32,
    pub genre_id: Option<GenreId>,
    pub duration_ms: i64,
    pub bitrate_kbps: i64,
    pub file_size_bytes: i64,
    pub modified_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Result of ingesting one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub song_id: SongId,
    /// False when the content was already in the library
    pub created: bool,
}
