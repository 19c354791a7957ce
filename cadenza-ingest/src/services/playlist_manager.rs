//! Playlist position manager
//!
//! Positions of a playlist are always exactly 1..N. Each mutation runs in
//! one transaction under a per-playlist async lock, retried on SQLite lock
//! contention.

use crate::db::playlists;
use crate::models::{Playlist, PlaylistEntry, PlaylistId, PlaylistSummary, SongId, UserId};
use crate::utils::{begin_monitored, retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use cadenza_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct PlaylistManager {
    pool: SqlitePool,
    locks: Mutex<HashMap<PlaylistId, Arc<tokio::sync::Mutex<()>>>>,
}

impl PlaylistManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn playlist_lock(&self, playlist_id: PlaylistId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::Internal("playlist lock table poisoned".to_string()))?;

        Ok(locks.entry(playlist_id).or_default().clone())
    }

    /// Add `song` to `playlist`, or move it if already present
    ///
    /// `desired_position <= 0` appends. Larger positions open a gap there;
    /// anything beyond N+1 lands at N+1. Returns the final position.
    pub async fn add_or_move(
        &self,
        playlist_id: PlaylistId,
        song_id: SongId,
        desired_position: i64,
    ) -> Result<i64> {
        let lock = self.playlist_lock(playlist_id)?;
        let _guard = lock.lock().await;

        let position = retry_on_lock("playlist add_or_move", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.add_or_move_once(playlist_id, song_id, desired_position)
        })
        .await?;

        tracing::debug!(playlist_id, song_id, position, "Placed song in playlist");
        Ok(position)
    }

    async fn add_or_move_once(
        &self,
        playlist_id: PlaylistId,
        song_id: SongId,
        desired_position: i64,
    ) -> Result<i64> {
        let mut tx = begin_monitored(&self.pool, "playlist_add_or_move").await?;
        let conn = &mut **tx.inner_mut()?;

        if !playlists::playlist_exists(conn, playlist_id).await? {
            return Err(Error::NotFound(format!("Playlist {}", playlist_id)));
        }

        if let Some(current) = playlists::entry_position(conn, playlist_id, song_id).await? {
            playlists::delete_entry(conn, playlist_id, song_id).await?;
            playlists::shift_down_after(conn, playlist_id, current).await?;
        }

        let position = if desired_position <= 0 {
            playlists::max_position(conn, playlist_id).await? + 1
        } else {
            let count = playlists::entry_count(conn, playlist_id).await?;
            let position = desired_position.min(count + 1);
            playlists::shift_up_from(conn, playlist_id, position).await?;
            position
        };

        playlists::insert_entry(conn, playlist_id, song_id, position).await?;
        playlists::touch_playlist(conn, playlist_id).await?;

        tx.commit().await?;
        Ok(position)
    }

    /// Remove `song` from `playlist`; absent songs are a no-op
    pub async fn remove(&self, playlist_id: PlaylistId, song_id: SongId) -> Result<()> {
        let lock = self.playlist_lock(playlist_id)?;
        let _guard = lock.lock().await;

        let removed = retry_on_lock("playlist remove", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.remove_once(playlist_id, song_id)
        })
        .await?;

        if removed {
            tracing::debug!(playlist_id, song_id, "Removed song from playlist");
        }
        Ok(())
    }

    async fn remove_once(&self, playlist_id: PlaylistId, song_id: SongId) -> Result<bool> {
        let mut tx = begin_monitored(&self.pool, "playlist_remove").await?;
        let conn = &mut **tx.inner_mut()?;

        let Some(current) = playlists::entry_position(conn, playlist_id, song_id).await? else {
            tx.rollback().await?;
            return Ok(false);
        };

        playlists::delete_entry(conn, playlist_id, song_id).await?;
        playlists::shift_down_after(conn, playlist_id, current).await?;
        playlists::touch_playlist(conn, playlist_id).await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn create_playlist(&self, user_id: UserId, name: &str) -> Result<Playlist> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Playlist name must not be empty".to_string()));
        }
        playlists::create_playlist(&self.pool, user_id, name).await
    }

    pub async fn list_playlists(&self, user_id: UserId) -> Result<Vec<PlaylistSummary>> {
        playlists::list_playlists(&self.pool, user_id).await
    }

    pub async fn get_playlist(&self, user_id: UserId, playlist_id: PlaylistId) -> Result<Playlist> {
        playlists::get_playlist(&self.pool, user_id, playlist_id).await
    }

    /// Entries ordered by position
    pub async fn playlist_songs(&self, playlist_id: PlaylistId) -> Result<Vec<PlaylistEntry>> {
        playlists::playlist_entries(&self.pool, playlist_id).await
    }

    pub async fn rename_playlist(&self, user_id: UserId, playlist_id: PlaylistId, name: &str) -> Result<Playlist> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Playlist name must not be empty".to_string()));
        }
        playlists::rename_playlist(&self.pool, user_id, playlist_id, name).await
    }

    pub async fn delete_playlist(&self, user_id: UserId, playlist_id: PlaylistId) -> Result<()> {
        playlists::delete_playlist(&self.pool, user_id, playlist_id).await?;

        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(&playlist_id);
        }
        Ok(())
    }
}
