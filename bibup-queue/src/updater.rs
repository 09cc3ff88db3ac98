//! Metadata updater
//!
//! Entry point for user intents. Owns the queue state and wires the row
//! store, processor and committer to the collaborators.

use bibup_common::events::{EventBus, UpdateEvent};
use bibup_common::{ItemId, QueueProgress, Result, RowSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use crate::committer::{ApplyCommitter, ApplyReport};
use crate::config::QueueConfig;
use crate::processor::{ProcessSummary, QueueProcessor};
use crate::schema::can_update;
use crate::services::Collaborators;
use crate::store::QueueState;

/// What an escape key press did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeOutcome {
    /// Dialog closed; rows kept because some still have differences or are unfinished
    CloseOnly,
    /// Dialog closed and rows cleared
    CloseAndClear,
}

pub struct MetadataUpdater {
    state: Arc<QueueState>,
    collaborators: Collaborators,
    processor: QueueProcessor,
    committer: ApplyCommitter,
    config: QueueConfig,
    apply_lock: Mutex<()>,
}

impl MetadataUpdater {
    /// `ready` gates the first processor iteration until the schema is loaded
    pub fn new(
        event_bus: EventBus,
        collaborators: Collaborators,
        ready: watch::Receiver<bool>,
        config: QueueConfig,
    ) -> Self {
        let state = Arc::new(QueueState::new(event_bus));
        let processor = QueueProcessor::new(
            Arc::clone(&state),
            collaborators.clone(),
            ready,
            config.clone(),
        );
        let committer = ApplyCommitter::new(collaborators.clone());

        Self {
            state,
            collaborators,
            processor,
            committer,
            config,
            apply_lock: Mutex::new(()),
        }
    }

    /// Updater whose schema is already available
    pub fn ready(event_bus: EventBus, collaborators: Collaborators, config: QueueConfig) -> Self {
        let (_tx, rx) = watch::channel(true);
        Self::new(event_bus, collaborators, rx, config)
    }

    pub fn state(&self) -> &Arc<QueueState> {
        &self.state
    }

    /// Queue items for lookup without processing them
    ///
    /// Missing items and items the schema does not allow updating are skipped.
    /// Returns the number of rows queued.
    pub async fn enqueue_items(&self, item_ids: &[ItemId]) -> Result<usize> {
        let schema = self.collaborators.schema.as_ref();
        let mut queued = 0;

        for &item_id in item_ids {
            let Some(record) = self.collaborators.records.get_record(item_id).await? else {
                warn!(item_id, "Cannot queue missing item");
                continue;
            };

            if self
                .state
                .rows
                .enqueue(
                    item_id,
                    &record,
                    |r| can_update(schema, r),
                    self.config.reenqueue_policy,
                )
                .await
                .is_some()
            {
                queued += 1;
            }
        }

        info!(requested = item_ids.len(), queued, "Items queued for metadata update");
        self.state.event_bus.emit_lossy(UpdateEvent::DialogOpenRequested {
            timestamp: chrono::Utc::now(),
        });
        Ok(queued)
    }

    /// Queue items and drain the queue
    pub async fn update_items(&self, item_ids: &[ItemId]) -> Result<Option<ProcessSummary>> {
        self.enqueue_items(item_ids).await?;
        Ok(self.process_queue().await)
    }

    /// Run the processor; `None` when it is already running
    pub async fn process_queue(&self) -> Option<ProcessSummary> {
        self.processor.process_queue().await
    }

    pub async fn toggle_field_acceptance(&self, item_id: ItemId, field_name: Option<&str>) -> bool {
        self.state.rows.toggle_acceptance(item_id, field_name).await
    }

    /// Commit accepted changes of every row
    ///
    /// Concurrent calls run one after another.
    pub async fn apply(&self) -> ApplyReport {
        let _apply = self.apply_lock.lock().await;

        let rows = self.state.rows.snapshot().await;
        let (report, saved) = self.committer.apply_accepted(&rows).await;

        // Re-diff committed rows against what is now stored
        let schema = self.collaborators.schema.as_ref();
        for committed in saved {
            self.state
                .rows
                .apply_external_update(schema, committed.item_id, committed.record)
                .await;
        }

        let bus = &self.state.event_bus;
        bus.emit_lossy(UpdateEvent::ApplyCompleted {
            committed: report.committed.len(),
            skipped: report.skipped,
            failed: report.failed.len(),
            timestamp: chrono::Utc::now(),
        });
        if report.has_failures() {
            bus.emit_lossy(UpdateEvent::ApplyFailed {
                failures: report.failed.clone(),
                timestamp: chrono::Utc::now(),
            });
        }

        report
    }

    /// Cancel while processing: drop every row
    pub async fn cancel(&self) {
        info!("Update cancelled");
        self.clear_and_close().await;
    }

    /// Close after processing: drop every row
    pub async fn close(&self) {
        self.clear_and_close().await;
    }

    async fn clear_and_close(&self) {
        self.state.rows.clear().await;
        self.state.event_bus.emit_lossy(UpdateEvent::DialogCloseRequested {
            cleared: true,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Escape closes the dialog; rows are cleared only when all are finished
    /// and none has pending differences
    pub async fn escape_pressed(&self) -> EscapeOutcome {
        let cleared = self.state.rows.clear_if_settled().await;

        self.state.event_bus.emit_lossy(UpdateEvent::DialogCloseRequested {
            cleared,
            timestamp: chrono::Utc::now(),
        });
        if cleared {
            EscapeOutcome::CloseAndClear
        } else {
            EscapeOutcome::CloseOnly
        }
    }

    /// Navigation request; no queue state changes
    pub fn open_item(&self, item_id: ItemId) {
        debug!(item_id, "Open item requested");
        self.state.event_bus.emit_lossy(UpdateEvent::OpenItemRequested {
            item_id,
            timestamp: chrono::Utc::now(),
        });
    }

    /// The stored item changed outside the queue
    ///
    /// Returns false when no row tracks the item or the item no longer exists.
    pub async fn notify_item_changed(&self, item_id: ItemId) -> Result<bool> {
        let Some(current) = self.collaborators.records.get_record(item_id).await? else {
            debug!(item_id, "Changed item no longer exists");
            return Ok(false);
        };

        Ok(self
            .state
            .rows
            .apply_external_update(self.collaborators.schema.as_ref(), item_id, current)
            .await)
    }

    pub async fn rows(&self) -> Vec<RowSnapshot> {
        self.state.rows.snapshot().await
    }

    pub async fn rows_count(&self) -> usize {
        self.state.rows.len().await
    }

    pub async fn progress(&self) -> QueueProgress {
        self.state.rows.progress().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.state.event_bus.subscribe()
    }

    pub fn is_processing(&self) -> bool {
        self.state.is_processing()
    }
}
