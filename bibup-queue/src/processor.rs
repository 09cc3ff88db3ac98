//! Queue processor
//!
//! Single sequential worker draining Queued rows:
//!
//! ```text
//! wait for schema readiness
//! loop:
//!     offline?       -> sleep(offline_recheck_interval), check again
//!     no Queued row? -> stop (Running -> Idle)
//!     claim row (Processing), load record, fetch update
//!     Ok(Some(r))    -> diff into row, Succeeded
//!     Ok(None)       -> keep diffs, Succeeded
//!     Err(e)         -> Failed (alert text or generic message)
//! ```
//!
//! A second `process_queue` call while the loop is running is a no-op. Rows
//! enqueued while the loop is finishing are picked up before it returns.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::error::FetchError;
use crate::services::Collaborators;
use crate::store::{ClaimedRow, QueueState};

/// Rows finished by one `process_queue` invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub succeeded: usize,
    pub failed: usize,
}

enum RowOutcome {
    Succeeded,
    Failed,
    /// Row was removed or replaced while the lookup ran
    Discarded,
}

/// Sequential metadata-lookup worker
pub struct QueueProcessor {
    state: Arc<QueueState>,
    collaborators: Collaborators,
    ready: watch::Receiver<bool>,
    config: QueueConfig,
}

impl QueueProcessor {
    pub fn new(
        state: Arc<QueueState>,
        collaborators: Collaborators,
        ready: watch::Receiver<bool>,
        config: QueueConfig,
    ) -> Self {
        Self {
            state,
            collaborators,
            ready,
            config,
        }
    }

    /// Drain the queue
    ///
    /// Returns `None` when another invocation is already running.
    pub async fn process_queue(&self) -> Option<ProcessSummary> {
        let mut summary: Option<ProcessSummary> = None;

        loop {
            let Some(guard) = self.state.try_start_processing() else {
                debug!("Queue processor already running");
                break;
            };

            let drained = self.drain().await;
            drop(guard);

            let total = summary.get_or_insert_with(ProcessSummary::default);
            total.succeeded += drained.succeeded;
            total.failed += drained.failed;

            // Enqueued after the last claim but before Idle
            if !self.state.rows.has_queued().await {
                break;
            }
        }

        if let Some(summary) = summary {
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Queue processing finished"
            );
        }
        summary
    }

    async fn wait_until_ready(&self) {
        let mut ready = self.ready.clone();
        let gate = ready.wait_for(|ready| *ready).await.map(|_| ());
        if gate.is_err() {
            debug!("Schema readiness gate closed, proceeding");
        }
    }

    async fn drain(&self) -> ProcessSummary {
        self.wait_until_ready().await;

        let mut summary = ProcessSummary::default();
        loop {
            if self.collaborators.connectivity.is_offline() {
                debug!(
                    recheck_secs = self.config.offline_recheck_interval.as_secs(),
                    "Offline, waiting before next check"
                );
                tokio::time::sleep(self.config.offline_recheck_interval).await;
                continue;
            }

            let Some(claim) = self
                .state
                .rows
                .claim_next_queued(&self.config.processing_message)
                .await
            else {
                break;
            };

            match self.process_row(&claim).await {
                RowOutcome::Succeeded => summary.succeeded += 1,
                RowOutcome::Failed => summary.failed += 1,
                RowOutcome::Discarded => {}
            }
        }
        summary
    }

    async fn process_row(&self, claim: &ClaimedRow) -> RowOutcome {
        let item_id = claim.item_id;
        debug!(item_id, "Processing row");

        let original = match self.collaborators.records.get_record(item_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return self.fail(claim, FetchError::NotFound(item_id)).await,
            Err(e) => return self.fail(claim, FetchError::from(e)).await,
        };

        match self
            .collaborators
            .source
            .fetch_updated_metadata(item_id, &original)
            .await
        {
            Ok(fetched) => {
                let found = fetched.is_some();
                let applied = self
                    .state
                    .rows
                    .complete_success(self.collaborators.schema.as_ref(), claim, original, fetched)
                    .await;
                if applied {
                    debug!(item_id, update_found = found, "Row succeeded");
                    RowOutcome::Succeeded
                } else {
                    RowOutcome::Discarded
                }
            }
            Err(e) => self.fail(claim, e).await,
        }
    }

    async fn fail(&self, claim: &ClaimedRow, error: FetchError) -> RowOutcome {
        warn!(item_id = claim.item_id, error = %error, "Metadata lookup failed");
        self.collaborators
            .diagnostics
            .log_error("metadata lookup", &error);

        let message = match &error {
            FetchError::Alert(text) => text.clone(),
            FetchError::NotFound(_) | FetchError::Other(_) => self.config.error_message.clone(),
        };

        if self.state.rows.complete_failure(claim, message).await {
            RowOutcome::Failed
        } else {
            RowOutcome::Discarded
        }
    }
}
