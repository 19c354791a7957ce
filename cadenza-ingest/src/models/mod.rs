//! Data models for the ingest core

pub mod batch;
pub mod library;
pub mod song;

pub use batch::{BatchState, BatchStatus, FileFailure};
pub use library::{
    LibraryFilter, LibrarySong, LibrarySort, Playlist, PlaylistEntry, PlaylistSummary,
    SimilarSong, SortField, SortOrder,
};
pub use song::{GenreId, IngestOutcome, NewSong, PlaylistId, Song, SongId, TrackTags, UserId};
