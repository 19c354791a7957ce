//! Library event types and broadcast bus
//!
//! Ingest batches report progress through `LibraryEvent`. Delivery is
//! best-effort: slow subscribers lag and lose old events, emitters never block.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Library lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum LibraryEvent {
    /// Batch picked up by the ingest queue
    BatchStarted {
        batch_id: Uuid,
        user_id: i64,
        /// Number of supported audio files found in the scratch directory
        total_files: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One file ingested and linked to the uploader
    FileIngested {
        batch_id: Uuid,
        song_id: i64,
        /// False when the content was already in the library
        created: bool,
        file_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One file failed; the batch continues
    FileFailed {
        batch_id: Uuid,
        file_name: String,
        /// Pipeline stage that failed (`hash`, `extract`, `store`, ...)
        stage: String,
        error_message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Every file in the batch was attempted
    BatchCompleted {
        batch_id: Uuid,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Batch stopped before all files were attempted
    BatchCancelled {
        batch_id: Uuid,
        succeeded: usize,
        failed: usize,
        /// Files never started because of cancellation
        skipped: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl LibraryEvent {
    /// Event type name (matches the serde tag)
    pub fn event_type(&self) -> &str {
        match self {
            LibraryEvent::BatchStarted { .. } => "BatchStarted",
            LibraryEvent::FileIngested { .. } => "FileIngested",
            LibraryEvent::FileFailed { .. } => "FileFailed",
            LibraryEvent::BatchCompleted { .. } => "BatchCompleted",
            LibraryEvent::BatchCancelled { .. } => "BatchCancelled",
        }
    }

    /// Batch the event belongs to
    pub fn batch_id(&self) -> Uuid {
        match self {
            LibraryEvent::BatchStarted { batch_id, .. }
            | LibraryEvent::FileIngested { batch_id, .. }
            | LibraryEvent::FileFailed { batch_id, .. }
            | LibraryEvent::BatchCompleted { batch_id, .. }
            | LibraryEvent::BatchCancelled { batch_id, .. } => *batch_id,
        }
    }
}

/// Broadcast bus for `LibraryEvent`
///
/// Cloning the inner sender is cheap; share the bus behind an `Arc`.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<LibraryEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before lagging receivers
    /// start losing the oldest ones.
    ///
    /// ```
    /// use cadenza_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LibraryEvent,
    ) -> Result<usize, broadcast::error::SendError<LibraryEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LibraryEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(batch_id: Uuid) -> LibraryEvent {
        LibraryEvent::BatchStarted {
            batch_id,
            user_id: 7,
            total_files: 3,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(8);
        assert!(bus.emit(started(Uuid::new_v4())).is_err());

        // Lossy variant swallows the same condition
        bus.emit_lossy(started(Uuid::new_v4()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let batch_id = Uuid::new_v4();

        bus.emit(started(batch_id)).unwrap();
        bus.emit(LibraryEvent::BatchCompleted {
            batch_id,
            succeeded: 3,
            failed: 0,
            duration_ms: 12,
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.event_type(), "BatchStarted");
        assert_eq!(second.event_type(), "BatchCompleted");
        assert_eq!(second.batch_id(), batch_id);
    }

    #[test]
    fn test_serialized_tag_matches_event_type() {
        let event = LibraryEvent::FileFailed {
            batch_id: Uuid::nil(),
            file_name: "broken.mp3".to_string(),
            stage: "extract".to_string(),
            error_message: "no tags".to_string(),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
        assert_eq!(json["stage"], "extract");
    }
}
