//! Background batch ingestion
//!
//! `submit` returns a batch id at once; the batch runs on its own task.
//! A queue-wide semaphore bounds files in flight across every batch, and
//! each batch holds a child of the queue's cancellation token. The scratch
//! directory is removed whatever state the batch ends in. Statuses of
//! finished batches are kept up to a retention count, oldest evicted first.

use crate::models::{BatchState, BatchStatus, FileFailure, PlaylistId, UserId};
use crate::services::file_scanner::FileScanner;
use crate::services::ingest_pipeline::IngestPipeline;
use cadenza_common::events::{EventBus, LibraryEvent};
use cadenza_common::{Error, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Finished batch statuses kept for `status` queries
pub const DEFAULT_BATCH_RETENTION: usize = 64;

struct BatchEntry {
    status: BatchStatus,
    cancel_token: CancellationToken,
}

enum FileResult {
    Ingested { created: bool },
    Failed(FileFailure),
    Skipped,
}

#[derive(Clone)]
struct QueueShared {
    pipeline: Arc<IngestPipeline>,
    events: Arc<EventBus>,
    permits: Arc<Semaphore>,
    worker_count: usize,
    retention: usize,
    batches: Arc<RwLock<HashMap<Uuid, BatchEntry>>>,
}

pub struct IngestQueue {
    shared: QueueShared,
    root_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl IngestQueue {
    /// Queue running at most `worker_count` files at a time
    pub fn new(pipeline: Arc<IngestPipeline>, events: Arc<EventBus>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        Self {
            shared: QueueShared {
                pipeline,
                events,
                permits: Arc::new(Semaphore::new(worker_count)),
                worker_count,
                retention: DEFAULT_BATCH_RETENTION,
                batches: Arc::new(RwLock::new(HashMap::new())),
            },
            root_token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Keep at most `retention` finished batches (at least one)
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.shared.retention = retention.max(1);
        self
    }

    /// Accept a scratch directory of uploads for background ingestion
    ///
    /// The queue takes ownership of `scratch_dir` and deletes it when the
    /// batch ends.
    pub async fn submit(
        &self,
        scratch_dir: PathBuf,
        user_id: UserId,
        playlist_id: Option<PlaylistId>,
    ) -> Result<Uuid> {
        if self.root_token.is_cancelled() {
            return Err(Error::Internal("Ingest queue is shut down".to_string()));
        }

        let batch_id = Uuid::new_v4();
        let cancel_token = self.root_token.child_token();

        self.shared.batches.write().await.insert(
            batch_id,
            BatchEntry {
                status: BatchStatus::new(batch_id, user_id, playlist_id),
                cancel_token: cancel_token.clone(),
            },
        );

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            shared
                .run_batch(batch_id, scratch_dir, user_id, playlist_id, cancel_token)
                .await;
        });

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| Error::Internal("ingest task list poisoned".to_string()))?;
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);

        tracing::info!(batch_id = %batch_id, user_id, "Batch submitted");
        Ok(batch_id)
    }

    /// Stop scheduling new files of a batch; in-flight files finish
    ///
    /// Returns false for unknown or already finished batches.
    pub async fn cancel(&self, batch_id: Uuid) -> bool {
        let batches = self.shared.batches.read().await;
        match batches.get(&batch_id) {
            Some(entry) if !entry.status.is_terminal() => {
                entry.cancel_token.cancel();
                tracing::info!(batch_id = %batch_id, "Batch cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Status of a running batch or a recently finished one
    pub async fn status(&self, batch_id: Uuid) -> Option<BatchStatus> {
        self.shared
            .batches
            .read()
            .await
            .get(&batch_id)
            .map(|entry| entry.status.clone())
    }

    /// Wait until a batch reaches a terminal state
    pub async fn wait(&self, batch_id: Uuid) -> Option<BatchStatus> {
        loop {
            let status = self.status(batch_id).await?;
            if status.is_terminal() {
                return Some(status);
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    /// Cancel every batch and wait for their tasks to finish
    pub async fn shutdown(&self) {
        self.root_token.cancel();

        let handles = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(_) => Vec::new(),
        };

        tracing::info!(batches = handles.len(), "Ingest queue shutting down");
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Batch task panicked");
            }
        }
    }
}

impl QueueShared {
    async fn update<F: FnOnce(&mut BatchStatus)>(&self, batch_id: Uuid, f: F) {
        if let Some(entry) = self.batches.write().await.get_mut(&batch_id) {
            f(&mut entry.status);
        }
    }

    /// Mark a batch terminal and evict the oldest finished batches beyond retention
    ///
    /// Both happen under one write lock so a waiter never sees a terminal
    /// status the eviction has not accounted for.
    async fn finish(&self, batch_id: Uuid, state: BatchState) -> (usize, usize) {
        let mut batches = self.batches.write().await;
        let summary = match batches.get_mut(&batch_id) {
            Some(entry) => {
                entry.status.finish(state);
                (entry.status.ingested + entry.status.duplicates, entry.status.failed)
            }
            None => (0, 0),
        };

        let mut finished: Vec<(DateTime<Utc>, Uuid)> = batches
            .iter()
            .filter_map(|(id, entry)| entry.status.finished_at.map(|at| (at, *id)))
            .collect();
        if finished.len() > self.retention {
            finished.sort();
            let evicted = finished.len() - self.retention;
            for (_, id) in finished.into_iter().take(evicted) {
                batches.remove(&id);
            }
            tracing::debug!(evicted, retained = self.retention, "Evicted finished batches");
        }

        summary
    }

    async fn run_batch(
        &self,
        batch_id: Uuid,
        scratch_dir: PathBuf,
        user_id: UserId,
        playlist_id: Option<PlaylistId>,
        cancel_token: CancellationToken,
    ) {
        let start = Instant::now();
        self.update(batch_id, |s| s.state = BatchState::Running).await;

        let files = match scan(&scratch_dir).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(batch_id = %batch_id, dir = %scratch_dir.display(), error = %e, "Batch scan failed");
                let failure = FileFailure {
                    path: scratch_dir.clone(),
                    stage: "scan".to_string(),
                    message: e.to_string(),
                };
                self.emit_failure(batch_id, &failure);
                self.update(batch_id, |s| s.add_failure(failure)).await;
                Vec::new()
            }
        };

        let total_files = files.len();
        self.update(batch_id, |s| s.total_files = total_files).await;
        self.events.emit_lossy(LibraryEvent::BatchStarted {
            batch_id,
            user_id,
            total_files,
            timestamp: Utc::now(),
        });
        tracing::info!(batch_id = %batch_id, user_id, total_files, "Batch started");

        let mut results = stream::iter(files)
            .map(|path| {
                let shared = self.clone();
                let cancel_token = cancel_token.clone();
                async move {
                    shared
                        .process_file(batch_id, path, user_id, playlist_id, &cancel_token)
                        .await
                }
            })
            .buffer_unordered(self.worker_count);

        let mut skipped = 0usize;
        while let Some(result) = results.next().await {
            match result {
                FileResult::Ingested { created } => {
                    self.update(batch_id, |s| {
                        if created {
                            s.ingested += 1;
                        } else {
                            s.duplicates += 1;
                        }
                    })
                    .await;
                }
                FileResult::Failed(failure) => {
                    self.emit_failure(batch_id, &failure);
                    self.update(batch_id, |s| s.add_failure(failure)).await;
                }
                FileResult::Skipped => skipped += 1,
            }
        }
        drop(results);

        if let Err(e) = tokio::fs::remove_dir_all(&scratch_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(batch_id = %batch_id, dir = %scratch_dir.display(), error = %e, "Failed to remove scratch directory");
            }
        }

        let cancelled = cancel_token.is_cancelled();
        let state = if cancelled { BatchState::Cancelled } else { BatchState::Completed };
        let (succeeded, failed) = self.finish(batch_id, state).await;

        let event = if cancelled {
            tracing::info!(batch_id = %batch_id, succeeded, failed, skipped, "Batch cancelled");
            LibraryEvent::BatchCancelled {
                batch_id,
                succeeded,
                failed,
                skipped,
                timestamp: Utc::now(),
            }
        } else {
            let duration_ms = start.elapsed().as_millis() as u64;
            tracing::info!(batch_id = %batch_id, succeeded, failed, duration_ms, "Batch completed");
            LibraryEvent::BatchCompleted {
                batch_id,
                succeeded,
                failed,
                duration_ms,
                timestamp: Utc::now(),
            }
        };
        self.events.emit_lossy(event);
    }

    async fn process_file(
        &self,
        batch_id: Uuid,
        path: PathBuf,
        user_id: UserId,
        playlist_id: Option<PlaylistId>,
        cancel_token: &CancellationToken,
    ) -> FileResult {
        let _permit = tokio::select! {
            _ = cancel_token.cancelled() => return FileResult::Skipped,
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return FileResult::Skipped,
            },
        };
        if cancel_token.is_cancelled() {
            return FileResult::Skipped;
        }

        match self.pipeline.ingest(&path, user_id, playlist_id).await {
            Ok(outcome) => {
                self.events.emit_lossy(LibraryEvent::FileIngested {
                    batch_id,
                    song_id: outcome.song_id,
                    created: outcome.created,
                    file_name: file_name(&path),
                    timestamp: Utc::now(),
                });
                FileResult::Ingested {
                    created: outcome.created,
                }
            }
            Err(e) => {
                tracing::error!(file = %path.display(), stage = e.stage_code(), error = %e, "File ingest failed");
                FileResult::Failed(FileFailure {
                    stage: e.stage_code().to_string(),
                    message: e.to_string(),
                    path,
                })
            }
        }
    }

    fn emit_failure(&self, batch_id: Uuid, failure: &FileFailure) {
        self.events.emit_lossy(LibraryEvent::FileFailed {
            batch_id,
            file_name: file_name(&failure.path),
            stage: failure.stage.clone(),
            error_message: failure.message.clone(),
            timestamp: Utc::now(),
        });
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn scan(dir: &Path) -> std::result::Result<Vec<PathBuf>, String> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || FileScanner::new().scan(&dir))
        .await
        .map_err(|e| format!("scan task failed: {}", e))?
        .map_err(|e| e.to_string())
}
