//! Playlist download as a zip archive
//!
//! Entries are stored uncompressed and named `<artist> - <title><.ext>` in
//! playlist order. Songs whose blob cannot be read are left out.

use super::blob_store::BlobStore;
use crate::db::playlists;
use crate::models::{PlaylistId, Song, UserId};
use cadenza_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::io::{Seek, Write};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub struct PlaylistExporter {
    pool: SqlitePool,
    blobs: Arc<dyn BlobStore>,
}

impl PlaylistExporter {
    pub fn new(pool: SqlitePool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { pool, blobs }
    }

    /// Write the playlist's songs to `writer` as a zip archive
    ///
    /// Fails with `NotFound` unless `user_id` owns the playlist. Returns the
    /// writer once the archive is finished.
    pub async fn export<W: Write + Seek + Send>(
        &self,
        user_id: UserId,
        playlist_id: PlaylistId,
        writer: W,
    ) -> Result<W> {
        let playlist = playlists::get_playlist(&self.pool, user_id, playlist_id).await?;
        let entries = playlists::playlist_entries(&self.pool, playlist_id).await?;

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut zip = ZipWriter::new(writer);
        let mut used = HashSet::new();
        let mut written = 0usize;

        for entry in &entries {
            let Some(content) = self.read_blob(&entry.song).await else {
                continue;
            };

            let name = unique_name(&mut used, entry_name(&entry.song));
            zip.start_file(name.as_str(), options).map_err(zip_error)?;
            zip.write_all(&content)?;
            written += 1;
        }

        let writer = zip.finish().map_err(zip_error)?;
        tracing::info!(
            playlist_id,
            playlist = %playlist.name,
            songs = written,
            skipped = entries.len() - written,
            "Exported playlist"
        );
        Ok(writer)
    }

    async fn read_blob(&self, song: &Song) -> Option<Vec<u8>> {
        let mut reader = match self.blobs.get(&song.blob_key).await {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!(song_id = song.id, key = %song.blob_key, error = %e, "Skipping song without blob");
                return None;
            }
        };

        let mut content = Vec::with_capacity(song.file_size_bytes.max(0) as usize);
        if let Err(e) = reader.read_to_end(&mut content).await {
            tracing::warn!(song_id = song.id, key = %song.blob_key, error = %e, "Skipping unreadable blob");
            return None;
        }
        Some(content)
    }
}

/// `<artist> - <title><.ext>`, extension taken from the blob key
fn entry_name(song: &Song) -> String {
    let ext = song
        .blob_key
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{}", ext))
        .unwrap_or_default();
    let name = format!("{} - {}{}", song.artist, song.title, ext);
    name.replace(['/', '\\'], "_")
}

/// Disambiguate repeated names with a ` (n)` suffix before the extension
fn unique_name(used: &mut HashSet<String>, name: String) -> String {
    if used.insert(name.clone()) {
        return name;
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) => name.split_at(dot),
        None => (name.as_str(), ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn zip_error(err: zip::result::ZipError) -> Error {
    Error::Internal(format!("Zip archive: {}", err))
}
