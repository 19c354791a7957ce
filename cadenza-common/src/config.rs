//! Configuration loading and root folder resolution
//!
//! Every setting resolves with the same priority order:
//! 1. Command-line argument (root folder only)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "CADENZA_ROOT_FOLDER";
/// Environment variable overriding the MusicBrainz contact address
pub const ENV_MUSICBRAINZ_EMAIL: &str = "CADENZA_MUSICBRAINZ_EMAIL";
/// Environment variable overriding the embedding service base URL
pub const ENV_EMBEDDING_URL: &str = "CADENZA_EMBEDDING_URL";
/// Environment variable overriding the ingest worker count
pub const ENV_WORKER_COUNT: &str = "CADENZA_WORKER_COUNT";

const DEFAULT_MUSICBRAINZ_URL: &str = "https://musicbrainz.org/ws/2";
const DEFAULT_MUSICBRAINZ_EMAIL: &str = "admin@localhost";
const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WORKER_COUNT: usize = 4;
const DEFAULT_SIMILAR_TOP_N: usize = 5;

/// On-disk TOML configuration (`cadenza.toml`)
///
/// All sections are optional; missing keys fall back to compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub storage: StorageConfig,
    pub services: ServicesConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

/// `[storage]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root folder holding the database and blob directory
    pub root_folder: Option<PathBuf>,
    /// Blob directory (relative paths resolve against the root folder)
    pub blob_dir: Option<PathBuf>,
    /// Database file (relative paths resolve against the root folder)
    pub database_file: Option<PathBuf>,
}

/// `[services]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServicesConfig {
    pub musicbrainz_url: Option<String>,
    /// Contact address sent in the MusicBrainz User-Agent
    pub musicbrainz_email: Option<String>,
    /// Base URL of the audio feature-extraction service
    pub embedding_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// `[ingest]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum number of files processed concurrently across all batches
    pub worker_count: Option<usize>,
    pub similar_top_n: Option<usize>,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub blob_dir: PathBuf,
    pub musicbrainz_url: String,
    pub musicbrainz_email: String,
    pub embedding_url: String,
    pub request_timeout: Duration,
    pub worker_count: usize,
    pub similar_top_n: usize,
    pub log_level: String,
}

impl Settings {
    /// Resolve settings from CLI argument, environment and TOML config
    pub fn resolve(cli_root_folder: Option<&Path>, toml: &TomlConfig) -> Result<Self> {
        let root_folder = resolve_root_folder(cli_root_folder, toml);

        let database_path = relative_to(
            &root_folder,
            toml.storage
                .database_file
                .clone()
                .unwrap_or_else(|| PathBuf::from("cadenza.db")),
        );
        let blob_dir = relative_to(
            &root_folder,
            toml.storage
                .blob_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("blobs")),
        );

        let worker_count = match std::env::var(ENV_WORKER_COUNT) {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|_| {
                Error::Config(format!("{} must be a positive integer, got '{}'", ENV_WORKER_COUNT, raw))
            })?,
            Err(_) => toml.ingest.worker_count.unwrap_or(DEFAULT_WORKER_COUNT),
        };
        if worker_count == 0 {
            return Err(Error::Config("ingest worker count must be at least 1".to_string()));
        }

        Ok(Self {
            root_folder,
            database_path,
            blob_dir,
            musicbrainz_url: toml
                .services
                .musicbrainz_url
                .clone()
                .unwrap_or_else(|| DEFAULT_MUSICBRAINZ_URL.to_string()),
            musicbrainz_email: env_or(
                ENV_MUSICBRAINZ_EMAIL,
                toml.services.musicbrainz_email.as_deref(),
                DEFAULT_MUSICBRAINZ_EMAIL,
            ),
            embedding_url: env_or(
                ENV_EMBEDDING_URL,
                toml.services.embedding_url.as_deref(),
                DEFAULT_EMBEDDING_URL,
            ),
            request_timeout: Duration::from_secs(
                toml.services
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            worker_count,
            similar_top_n: toml.ingest.similar_top_n.unwrap_or(DEFAULT_SIMILAR_TOP_N),
            log_level: toml.logging.level.clone(),
        })
    }
}

/// Root folder resolution:
/// 1. Command-line argument (highest priority)
/// 2. `CADENZA_ROOT_FOLDER`
/// 3. `[storage] root_folder` in TOML
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.storage.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Load TOML config from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load TOML config from an explicit path, or the default location if present
///
/// A missing default file yields `TomlConfig::default()`; a missing explicit
/// file is an error.
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            debug!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        _ => {
            debug!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Default config file location (`~/.config/cadenza/cadenza.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cadenza").join("cadenza.toml"))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("cadenza"),
        None => {
            warn!("Could not determine data directory, using ./cadenza_data");
            PathBuf::from("./cadenza_data")
        }
    }
}

fn env_or(var: &str, toml_value: Option<&str>, default: &str) -> String {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => toml_value.unwrap_or(default).to_string(),
    }
}

fn relative_to(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_resolve_against_root() {
        let root = Path::new("/srv/cadenza");
        assert_eq!(
            relative_to(root, PathBuf::from("blobs")),
            PathBuf::from("/srv/cadenza/blobs")
        );
        assert_eq!(
            relative_to(root, PathBuf::from("/var/blobs")),
            PathBuf::from("/var/blobs")
        );
    }

    #[test]
    fn test_cli_root_folder_wins() {
        let toml = TomlConfig {
            storage: StorageConfig {
                root_folder: Some(PathBuf::from("/from/toml")),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &toml);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_partial_toml_parses_with_defaults() {
        let toml: TomlConfig = toml::from_str(
            r#"
            [services]
            embedding_url = "http://embedder:8000"
            "#,
        )
        .unwrap();

        assert_eq!(toml.services.embedding_url.as_deref(), Some("http://embedder:8000"));
        assert_eq!(toml.logging.level, "info");
        assert!(toml.ingest.worker_count.is_none());
    }
}
