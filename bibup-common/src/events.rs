//! Event types for the bibup event system
//!
//! Provides the observer-channel event definitions and the EventBus that
//! carries them from the queue core to the presentation layer.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{ItemId, QueueProgress, RowSnapshot};

/// Per-row failure reported by an apply run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub item_id: ItemId,
    pub message: String,
}

/// bibup event types
///
/// Events are broadcast via EventBus and serialized as-is for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpdateEvent {
    /// Row store changed
    ///
    /// Emitted after every row store mutation with an owned copy of all rows.
    /// Triggers:
    /// - Review table: re-render rows
    /// - Toolbar: update pending row count
    /// - Progress meter: processed / total
    RowsChanged {
        rows: Vec<RowSnapshot>,
        rows_count: usize,
        progress: QueueProgress,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Items were queued; the review dialog should be shown
    DialogOpenRequested {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The review dialog should be closed
    DialogCloseRequested {
        /// Whether the rows were cleared as part of closing
        cleared: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User asked to navigate to an item (no queue state change)
    OpenItemRequested {
        item_id: ItemId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Apply run finished
    ApplyCompleted {
        committed: usize,
        skipped: usize,
        failed: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Aggregate failure notice for an apply run with failed rows
    ApplyFailed {
        failures: Vec<ApplyFailure>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl UpdateEvent {
    /// Build a RowsChanged event from a snapshot
    pub fn rows_changed(rows: Vec<RowSnapshot>) -> Self {
        let progress = QueueProgress::from_rows(&rows);
        UpdateEvent::RowsChanged {
            rows_count: rows.len(),
            rows,
            progress,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            UpdateEvent::RowsChanged { .. } => "RowsChanged",
            UpdateEvent::DialogOpenRequested { .. } => "DialogOpenRequested",
            UpdateEvent::DialogCloseRequested { .. } => "DialogCloseRequested",
            UpdateEvent::OpenItemRequested { .. } => "OpenItemRequested",
            UpdateEvent::ApplyCompleted { .. } => "ApplyCompleted",
            UpdateEvent::ApplyFailed { .. } => "ApplyFailed",
        }
    }
}

/// Central event distribution bus
///
/// Wraps a tokio broadcast channel; every subscriber receives every event
/// emitted after it subscribed. Slow subscribers lose the oldest events once
/// `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UpdateEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use bibup_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: UpdateEvent,
    ) -> Result<usize, broadcast::error::SendError<UpdateEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: UpdateEvent) {
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
    use crate::model::RowStatus;

    fn row(item_id: ItemId, status: RowStatus) -> RowSnapshot {
        RowSnapshot {
            item_id,
            status,
            title: format!("Item {}", item_id),
            message: String::new(),
            fields: vec![],
        }
    }

    #[test]
    fn test_rows_changed_counts() {
        let event = UpdateEvent::rows_changed(vec![
            row(1, RowStatus::Succeeded),
            row(2, RowStatus::Queued),
        ]);

        match event {
            UpdateEvent::RowsChanged { rows_count, progress, .. } => {
                assert_eq!(rows_count, 2);
                assert_eq!(progress.processed, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = UpdateEvent::OpenItemRequested {
            item_id: 7,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OpenItemRequested");
        assert_eq!(json["item_id"], 7);
        assert_eq!(event.event_type(), "OpenItemRequested");
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_all_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let delivered = bus
            .emit(UpdateEvent::DialogOpenRequested {
                timestamp: chrono::Utc::now(),
            })
            .unwrap();
        assert_eq!(delivered, 2);

        assert_eq!(rx1.recv().await.unwrap().event_type(), "DialogOpenRequested");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "DialogOpenRequested");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus
            .emit(UpdateEvent::DialogOpenRequested {
                timestamp: chrono::Utc::now(),
            })
            .is_err());
        // Lossy emit never fails
        bus.emit_lossy(UpdateEvent::DialogOpenRequested {
            timestamp: chrono::Utc::now(),
        });
    }
}
