//! Ingest batch state

use super::song::{PlaylistId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Batch lifecycle
///
/// Queued → Running → Completed | Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchState {
    /// Accepted, waiting for its task to start
    Queued,
    /// Files are being ingested
    Running,
    /// Every file was attempted
    Completed,
    /// Stopped before every file was attempted
    Cancelled,
}

/// One file that failed inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    /// Pipeline stage code (`hash`, `extract`, `store`, ...)
    pub stage: String,
    pub message: String,
}

/// Snapshot of one batch's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: Uuid,
    pub user_id: UserId,
    pub playlist_id: Option<PlaylistId>,
    pub state: BatchState,
    /// Supported files found in the scratch directory
    pub total_files: usize,
    /// New songs created
    pub ingested: usize,
    /// Files whose content was already in the library
    pub duplicates: usize,
    pub failed: usize,
    pub failures: Vec<FileFailure>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchStatus {
    pub fn new(batch_id: Uuid, user_id: UserId, playlist_id: Option<PlaylistId>) -> Self {
        Self {
            batch_id,
            user_id,
            playlist_id,
            state: BatchState::Queued,
            total_files: 0,
            ingested: 0,
            duplicates: 0,
            failed: 0,
            failures: Vec::new(),
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Files attempted so far
    pub fn processed(&self) -> usize {
        self.ingested + self.duplicates + self.failed
    }

    /// Record a failure
    pub fn add_failure(&mut self, failure: FileFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// Move to a terminal state and stamp the finish time
    pub fn finish(&mut self, state: BatchState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, BatchState::Completed | BatchState::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_count_toward_processed() {
        let mut status = BatchStatus::new(Uuid::new_v4(), 1, None);
        status.ingested = 2;
        status.duplicates = 1;
        status.add_failure(FileFailure {
            path: PathBuf::from("/tmp/x.mp3"),
            stage: "extract".to_string(),
            message: "unreadable".to_string(),
        });

        assert_eq!(status.processed(), 4);
        assert_eq!(status.failures.len(), 1);
        assert!(!status.is_terminal());

        status.finish(BatchState::Completed);
        assert!(status.is_terminal());
        assert!(status.finished_at.is_some());
    }
}
