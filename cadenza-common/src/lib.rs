//! # Cadenza Common Library
//!
//! Shared code for the Cadenza library services:
//! - Error type and result alias
//! - Configuration loading (TOML + environment)
//! - Database initialization and schema
//! - Library event types and the EventBus

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
