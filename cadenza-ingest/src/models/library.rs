//! Library, playlist and similarity read models

use super::song::{PlaylistId, Song, SongId, UserId};
use cadenza_common::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A song as it appears in one user's library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySong {
    pub song: Song,
    pub genre: Option<String>,
    pub rating: Option<i64>,
    pub added_at: DateTime<Utc>,
}

/// Library listing filters
///
/// Text filters are case-insensitive substring matches; `year` is exact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryFilter {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
}

/// Sortable library columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Title,
    Artist,
    Album,
    Year,
    Duration,
    Rating,
    LastModified,
}

impl SortField {
    /// SQL expression for ORDER BY (fixed whitelist, never user text)
    pub fn column(self) -> &'static str {
        match self {
            SortField::Title => "s.title",
            SortField::Artist => "s.artist",
            SortField::Album => "s.album",
            SortField::Year => "s.year",
            SortField::Duration => "s.duration_ms",
            SortField::Rating => "us.rating",
            SortField::LastModified => "s.modified_at",
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(SortField::Title),
            "artist" => Ok(SortField::Artist),
            "album" => Ok(SortField::Album),
            "year" => Ok(SortField::Year),
            "duration" => Ok(SortField::Duration),
            "rating" => Ok(SortField::Rating),
            "last_modified" => Ok(SortField::LastModified),
            other => Err(Error::InvalidInput(format!("Unknown sort field: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySort {
    pub field: SortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub user_id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Playlist with its entry count, as listed for its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub playlist: Playlist,
    pub song_count: i64,
}

/// One playlist slot (positions are 1-based)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub song: Song,
    pub genre: Option<String>,
    pub position: i64,
}

/// Nearest-neighbor result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarSong {
    pub song_id: SongId,
    pub title: String,
    pub artist: String,
    /// Cosine similarity in `[-1, 1]`
    pub similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_field_whitelist() {
        assert_eq!("last_modified".parse::<SortField>().unwrap(), SortField::LastModified);
        assert_eq!("rating".parse::<SortField>().unwrap().column(), "us.rating");
        assert!("title; DROP TABLE songs".parse::<SortField>().is_err());
    }
}
