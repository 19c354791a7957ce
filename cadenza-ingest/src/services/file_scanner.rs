//! Upload directory scanner
//!
//! Recursive discovery of files with a supported audio extension. Content
//! is not inspected here; unreadable audio fails later at tag extraction.
//! Symlinks are neither followed nor returned.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Extensions accepted for ingestion (lowercase)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a", "ogg"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Entry names skipped along with everything beneath them
const IGNORED_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "__MACOSX", ".git"];

pub struct FileScanner {
    ignored_names: Vec<String>,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FileScanner {
    /// Scanner that skips OS litter such as `.DS_Store` and `__MACOSX`
    pub fn new() -> Self {
        Self {
            ignored_names: IGNORED_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Supported files under `root`, sorted by path
    ///
    /// Unreadable entries are logged and skipped.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_ignored(e));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_supported(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Error accessing entry");
                }
            }
        }

        files.sort();
        tracing::debug!(root = %root.display(), files = files.len(), "Scan complete");
        Ok(files)
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        let file_name = entry.file_name().to_string_lossy();
        self.ignored_names.iter().any(|n| *n == file_name)
    }
}
