//! Queue row: one tracked item's update-review state

use bibup_common::{FieldDiff, ItemId, Record, RowSnapshot, RowStatus};

use crate::schema::ITEM_TYPE_FIELD;

/// One tracked item in the row store
///
/// Lifecycle: Queued → Processing → {Succeeded, Failed}. Only the queue
/// processor moves a row out of Processing.
#[derive(Debug, Clone)]
pub struct Row {
    pub item_id: ItemId,
    pub status: RowStatus,
    pub title: String,
    pub message: String,
    /// Ordered diffs: creators, itemType, then scalar fields
    pub fields: Vec<FieldDiff>,
    /// Last record obtained from the metadata source (or the original when
    /// the lookup returned nothing)
    pub latest_fetched_record: Option<Record>,
    /// Current-record snapshot received while the worker owned the row
    pub(crate) pending_current: Option<Record>,
    /// Assigned on every enqueue/replace; stale lookups compare against it
    pub(crate) generation: u64,
}

impl Row {
    pub(crate) fn new(item_id: ItemId, title: String, generation: u64) -> Self {
        Self {
            item_id,
            status: RowStatus::Queued,
            title,
            message: String::new(),
            fields: Vec::new(),
            latest_fetched_record: None,
            pending_current: None,
            generation,
        }
    }

    pub fn field(&self, field_name: &str) -> Option<&FieldDiff> {
        self.fields.iter().find(|f| f.field_name == field_name)
    }

    pub fn field_mut(&mut self, field_name: &str) -> Option<&mut FieldDiff> {
        self.fields.iter_mut().find(|f| f.field_name == field_name)
    }

    /// The diff set contains a record type change
    pub fn is_item_type_changed(&self) -> bool {
        self.field(ITEM_TYPE_FIELD).is_some()
    }

    /// Owned copy for observers
    pub fn snapshot(&self) -> RowSnapshot {
        RowSnapshot {
            item_id: self.item_id,
            status: self.status,
            title: self.title.clone(),
            message: self.message.clone(),
            fields: self.fields.clone(),
        }
    }
}
