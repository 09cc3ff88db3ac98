//! Row store and shared queue state
//!
//! `RowStore` is the ordered item-id → row mapping. Every public mutation runs
//! inside one write-lock critical section and publishes a `RowsChanged`
//! snapshot before releasing the lock, so observers see mutations in order and
//! never a half-applied update.
//!
//! Rows owned by the worker (status Processing) are only completed through
//! `complete_success` / `complete_failure`, which check the row generation so a
//! lookup that finishes after a cancel or re-enqueue is discarded.

use bibup_common::config::ReenqueuePolicy;
use bibup_common::events::{EventBus, UpdateEvent};
use bibup_common::{ItemId, QueueProgress, Record, RowSnapshot, RowStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::diff::compute_diff;
use crate::policy;
use crate::row::Row;
use crate::schema::ItemSchema;

/// Handle to a row the worker has claimed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedRow {
    pub item_id: ItemId,
    pub(crate) generation: u64,
}

#[derive(Default)]
struct StoreInner {
    rows: Vec<Row>,
    next_generation: u64,
}

impl StoreInner {
    fn position(&self, item_id: ItemId) -> Option<usize> {
        self.rows.iter().position(|r| r.item_id == item_id)
    }

    fn find_mut(&mut self, item_id: ItemId) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| r.item_id == item_id)
    }

    fn snapshot(&self) -> Vec<RowSnapshot> {
        self.rows.iter().map(Row::snapshot).collect()
    }
}

/// Ordered, observable collection of queue rows
pub struct RowStore {
    inner: RwLock<StoreInner>,
    event_bus: EventBus,
}

impl RowStore {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            event_bus,
        }
    }

    fn publish(&self, inner: &StoreInner) {
        self.event_bus
            .emit_lossy(UpdateEvent::rows_changed(inner.snapshot()));
    }

    /// Queue an item for lookup
    ///
    /// Skipped (returns None) when `can_update` rejects the record or the item
    /// is currently being processed. An existing row is replaced in place;
    /// new rows are appended.
    pub async fn enqueue<F>(
        &self,
        item_id: ItemId,
        record: &Record,
        can_update: F,
        reenqueue: ReenqueuePolicy,
    ) -> Option<RowSnapshot>
    where
        F: FnOnce(&Record) -> bool,
    {
        if !can_update(record) {
            debug!(item_id, item_type = %record.item_type, "Item cannot be updated, skipping");
            return None;
        }

        let mut inner = self.inner.write().await;
        let existing = inner.position(item_id);
        if let Some(idx) = existing {
            if inner.rows[idx].status == RowStatus::Processing {
                debug!(item_id, "Item already processing, skipping enqueue");
                return None;
            }
        }

        inner.next_generation += 1;
        let mut row = Row::new(item_id, record.title(), inner.next_generation);

        match existing {
            Some(idx) => {
                if reenqueue == ReenqueuePolicy::Merge {
                    row.fields = std::mem::take(&mut inner.rows[idx].fields);
                }
                inner.rows[idx] = row;
                debug!(item_id, policy = ?reenqueue, "Replaced existing row");
            }
            None => inner.rows.push(row),
        }

        let snapshot = inner
            .position(item_id)
            .map(|idx| inner.rows[idx].snapshot());
        self.publish(&inner);
        snapshot
    }

    /// Re-diff a row after its stored record changed outside the queue
    ///
    /// `current` is the stored record as it is now. Returns false when no row
    /// tracks the item. Status is never changed.
    pub async fn apply_external_update(
        &self,
        schema: &dyn ItemSchema,
        item_id: ItemId,
        current: Record,
    ) -> bool {
        let mut inner = self.inner.write().await;
        let Some(row) = inner.find_mut(item_id) else {
            return false;
        };

        row.title = current.title();

        if row.status == RowStatus::Processing {
            // Worker owns the diff set; it compares against this snapshot on completion
            debug!(item_id, "Row is processing, deferring external update");
            row.pending_current = Some(current);
        } else if let Some(fetched) = row.latest_fetched_record.clone() {
            row.fields = compute_diff(schema, &current, &fetched, row);
            if policy::reset_if_item_type_changed(row) {
                debug!(item_id, "Item type differs, all fields reset to unaccepted");
            }
        }

        self.publish(&inner);
        true
    }

    /// Toggle acceptance of one field, or of the whole row when `field_name` is None
    pub async fn toggle_acceptance(&self, item_id: ItemId, field_name: Option<&str>) -> bool {
        let mut inner = self.inner.write().await;
        let Some(row) = inner.find_mut(item_id) else {
            debug!(item_id, "Toggle for unknown row ignored");
            return false;
        };

        let toggled = policy::toggle(row, field_name);
        if !toggled {
            debug!(item_id, field = ?field_name, "Toggle for unknown field ignored");
        }
        self.publish(&inner);
        toggled
    }

    /// Remove every row
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        let removed = inner.rows.len();
        inner.rows.clear();
        info!(removed, "Row store cleared");
        self.publish(&inner);
    }

    /// Remove every row when all are terminal and none has differences left
    ///
    /// Decided and applied in one critical section. Returns true when the rows
    /// were cleared.
    pub async fn clear_if_settled(&self) -> bool {
        let mut inner = self.inner.write().await;
        let unsettled = inner
            .rows
            .iter()
            .any(|row| !row.fields.is_empty() || !row.status.is_terminal());
        if unsettled {
            return false;
        }

        let removed = inner.rows.len();
        inner.rows.clear();
        info!(removed, "Row store cleared (all rows settled)");
        self.publish(&inner);
        true
    }

    /// Owned copy of all rows in store order
    pub async fn snapshot(&self) -> Vec<RowSnapshot> {
        self.inner.read().await.snapshot()
    }

    pub async fn get(&self, item_id: ItemId) -> Option<RowSnapshot> {
        let inner = self.inner.read().await;
        inner
            .rows
            .iter()
            .find(|r| r.item_id == item_id)
            .map(Row::snapshot)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn progress(&self) -> QueueProgress {
        QueueProgress::from_rows(&self.snapshot().await)
    }

    pub async fn has_queued(&self) -> bool {
        self.inner
            .read()
            .await
            .rows
            .iter()
            .any(|r| r.status == RowStatus::Queued)
    }

    /// Claim the first Queued row for the worker, marking it Processing
    pub async fn claim_next_queued(&self, message: &str) -> Option<ClaimedRow> {
        let mut inner = self.inner.write().await;
        let row = inner
            .rows
            .iter_mut()
            .find(|r| r.status == RowStatus::Queued)?;

        row.status = RowStatus::Processing;
        row.message = message.to_string();
        row.pending_current = None;
        let claim = ClaimedRow {
            item_id: row.item_id,
            generation: row.generation,
        };

        self.publish(&inner);
        Some(claim)
    }

    fn claimed_row<'a>(inner: &'a mut StoreInner, claim: &ClaimedRow) -> Option<&'a mut Row> {
        inner.find_mut(claim.item_id).filter(|r| {
            r.generation == claim.generation && r.status == RowStatus::Processing
        })
    }

    /// Finish a claimed row with the lookup result
    ///
    /// `fetched` None means the source had no update: the diff set is left as
    /// it is and the original record becomes the comparison baseline.
    /// Returns false when the row is gone or was replaced (result discarded).
    pub async fn complete_success(
        &self,
        schema: &dyn ItemSchema,
        claim: &ClaimedRow,
        original: Record,
        fetched: Option<Record>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        let Some(row) = Self::claimed_row(&mut inner, claim) else {
            debug!(item_id = claim.item_id, "Row removed during lookup, result discarded");
            return false;
        };

        let baseline = row.pending_current.take().unwrap_or(original);
        match fetched {
            Some(new_record) => {
                row.fields = compute_diff(schema, &baseline, &new_record, row);
                row.latest_fetched_record = Some(new_record);
            }
            None => {
                row.latest_fetched_record = Some(baseline);
            }
        }
        row.status = RowStatus::Succeeded;
        row.message.clear();

        self.publish(&inner);
        true
    }

    /// Finish a claimed row as failed
    pub async fn complete_failure(&self, claim: &ClaimedRow, message: String) -> bool {
        let mut inner = self.inner.write().await;
        let Some(row) = Self::claimed_row(&mut inner, claim) else {
            debug!(item_id = claim.item_id, "Row removed during lookup, failure discarded");
            return false;
        };

        row.status = RowStatus::Failed;
        row.message = message;
        row.pending_current = None;

        self.publish(&inner);
        true
    }
}

/// Queue state shared by the processor, the updater facade and observers
///
/// Owned explicitly and passed around as `Arc<QueueState>`.
pub struct QueueState {
    pub rows: RowStore,
    pub event_bus: EventBus,
    running: AtomicBool,
}

/// Resets the processor to Idle when dropped
pub struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl QueueState {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            rows: RowStore::new(event_bus.clone()),
            event_bus,
            running: AtomicBool::new(false),
        }
    }

    /// Idle → Running; None when a processor loop is already running
    pub fn try_start_processing(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard {
                flag: &self.running,
            })
    }

    pub fn is_processing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
