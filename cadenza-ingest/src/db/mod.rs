//! Database access for the ingest core
//!
//! Schema and pool setup live in `cadenza_common::db`.

pub mod embeddings;
pub mod genres;
pub mod library;
pub mod playlists;
pub mod songs;
