//! Test Helper Utilities
//!
//! Shared utilities for cadenza-ingest integration tests

#![allow(dead_code, unused_imports)]

pub mod audio_generator;
pub mod db_utils;
pub mod doubles;

pub use audio_generator::{generate_test_wav, write_bytes};
pub use db_utils::{create_test_db, genre_count, song_count, user_song_count};
pub use doubles::{default_library, test_library, FixedTagReader};
