//! Apply committer
//!
//! Writes accepted field values back to the record store, one transaction per
//! row, in store order. Per row: type change first (so later writes target the
//! new type's field set), then the creator list wholesale, then every other
//! accepted field valid for the final type.
//!
//! A failing row is logged and reported; the remaining rows are still committed.

use bibup_common::events::ApplyFailure;
use bibup_common::{FieldDiff, ItemId, Record, RowSnapshot};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CommitError;
use crate::schema::{CREATORS_FIELD, ITEM_TYPE_FIELD};
use crate::services::Collaborators;

/// Outcome of one apply run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Rows written, in store order
    pub committed: Vec<ItemId>,
    /// Rows without any accepted field
    pub skipped: usize,
    pub failed: Vec<ApplyFailure>,
}

impl ApplyReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Row committed by an apply run, with the record as saved
#[derive(Debug, Clone)]
pub struct CommittedRow {
    pub item_id: ItemId,
    pub record: Record,
}

pub struct ApplyCommitter {
    collaborators: Collaborators,
}

impl ApplyCommitter {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Commit the accepted fields of every row
    ///
    /// Returns the report plus the saved records of committed rows.
    pub async fn apply_accepted(&self, rows: &[RowSnapshot]) -> (ApplyReport, Vec<CommittedRow>) {
        let mut report = ApplyReport::default();
        let mut saved = Vec::new();

        for row in rows {
            match self.commit_row(row).await {
                Ok(Some(record)) => {
                    report.committed.push(row.item_id);
                    saved.push(CommittedRow {
                        item_id: row.item_id,
                        record,
                    });
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!(item_id = row.item_id, error = %e, "Failed to commit accepted changes");
                    self.collaborators
                        .diagnostics
                        .log_error("apply accepted changes", &e);
                    report.failed.push(ApplyFailure {
                        item_id: row.item_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            committed = report.committed.len(),
            skipped = report.skipped,
            failed = report.failed.len(),
            "Apply finished"
        );
        (report, saved)
    }

    /// Commit one row; `Ok(None)` when nothing was accepted
    async fn commit_row(&self, row: &RowSnapshot) -> Result<Option<Record>, CommitError> {
        let accepted: Vec<&FieldDiff> = row.fields.iter().filter(|f| f.is_accepted).collect();
        if accepted.is_empty() {
            return Ok(None);
        }

        let item_id = row.item_id;
        let schema = self.collaborators.schema.as_ref();
        let mut record = self
            .collaborators
            .records
            .get_record(item_id)
            .await?
            .ok_or(CommitError::NotFound(item_id))?;

        if let Some(diff) = accepted.iter().find(|f| f.field_name == ITEM_TYPE_FIELD) {
            let new_type = diff
                .new_value
                .as_text()
                .ok_or_else(|| CommitError::MalformedValue(ITEM_TYPE_FIELD.to_string()))?;
            if schema.canonical_type_id(new_type).is_none() {
                return Err(CommitError::UnknownType(new_type.to_string()));
            }
            let valid_fields = schema.fields_for_type(new_type);
            record.set_type(new_type, &valid_fields);
            debug!(item_id, item_type = new_type, "Changed item type");
        }

        if let Some(diff) = accepted.iter().find(|f| f.field_name == CREATORS_FIELD) {
            let creators = diff
                .new_value
                .as_creators()
                .ok_or_else(|| CommitError::MalformedValue(CREATORS_FIELD.to_string()))?;
            record.replace_creators(creators.to_vec());
        }

        for diff in accepted
            .iter()
            .filter(|f| f.field_name != ITEM_TYPE_FIELD && f.field_name != CREATORS_FIELD)
        {
            if !schema.is_valid_field_for_type(&diff.field_name, &record.item_type) {
                debug!(
                    item_id,
                    field = %diff.field_name,
                    item_type = %record.item_type,
                    "Field not valid for item type, left untouched"
                );
                continue;
            }
            let value = diff
                .new_value
                .as_text()
                .ok_or_else(|| CommitError::MalformedValue(diff.field_name.clone()))?;
            record.set_field(diff.field_name.clone(), value);
        }

        self.collaborators
            .records
            .save_record(item_id, &record)
            .await?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_pool, SqliteRecordStore};
    use crate::diff::compute_diff;
    use crate::row::Row;
    use crate::schema::TableSchema;
    use crate::services::{AlwaysOnline, MetadataSource, RecordStore, TracingDiagnostics};
    use async_trait::async_trait;
    use bibup_common::{Creator, FieldValue, RowStatus};
    use std::sync::Arc;

    struct NoSource;

    #[async_trait]
    impl MetadataSource for NoSource {
        async fn fetch_updated_metadata(
            &self,
            _item_id: ItemId,
            _record: &Record,
        ) -> Result<Option<Record>, crate::error::FetchError> {
            Ok(None)
        }
    }

    async fn setup() -> (ApplyCommitter, Arc<SqliteRecordStore>) {
        let store = Arc::new(SqliteRecordStore::new(init_memory_pool().await.unwrap()));
        let collaborators = Collaborators {
            records: store.clone(),
            source: Arc::new(NoSource),
            connectivity: Arc::new(AlwaysOnline),
            schema: Arc::new(TableSchema::builtin()),
            diagnostics: Arc::new(TracingDiagnostics),
        };
        (ApplyCommitter::new(collaborators), store)
    }

    fn old_record() -> Record {
        Record::new("book")
            .with_creator(Creator::new("author", "Ada", "Lovelace"))
            .with_field("title", "Sketch")
            .with_field("publisher", "Taylor")
            .with_field("date", "1843")
    }

    fn new_record() -> Record {
        Record::new("journalArticle")
            .with_creator(Creator::new("editor", "Ada", "Lovelace"))
            .with_creator(Creator::new("author", "Luigi", "Menabrea"))
            .with_field("title", "Sketch of the Analytical Engine")
            .with_field("publicationTitle", "Scientific Memoirs")
            .with_field("date", "1843")
    }

    fn snapshot(item_id: ItemId, old: &Record, new: &Record) -> RowSnapshot {
        let schema = TableSchema::builtin();
        let mut row = Row::new(item_id, old.title(), 1);
        row.fields = compute_diff(&schema, old, new, &row);
        row.status = RowStatus::Succeeded;
        row.snapshot()
    }

    fn set_accepted(row: &mut RowSnapshot, field_name: &str, accepted: bool) {
        for field in row.fields.iter_mut().filter(|f| f.field_name == field_name) {
            field.is_accepted = accepted;
        }
    }

    #[tokio::test]
    async fn test_type_and_creators_accepted() {
        let (committer, store) = setup().await;
        let item_id = store.insert_record(&old_record()).await.unwrap();
        let mut row = snapshot(item_id, &old_record(), &new_record());
        set_accepted(&mut row, "title", false);

        let (report, saved) = committer.apply_accepted(&[row]).await;
        assert_eq!(report.committed, vec![item_id]);
        assert_eq!(saved.len(), 1);

        let stored = store.get_record(item_id).await.unwrap().unwrap();
        assert_eq!(stored.item_type, "journalArticle");
        assert_eq!(stored.creators, new_record().creators);
        assert_eq!(stored.field("publicationTitle"), "Scientific Memoirs");
        assert_eq!(stored.field("title"), "Sketch", "unaccepted field keeps old value");
        assert_eq!(stored.field("publisher"), "", "not valid for the new type");
    }

    #[tokio::test]
    async fn test_type_rejected_creators_accepted() {
        let (committer, store) = setup().await;
        let item_id = store.insert_record(&old_record()).await.unwrap();
        let mut row = snapshot(item_id, &old_record(), &new_record());
        set_accepted(&mut row, "itemType", false);

        committer.apply_accepted(&[row]).await;

        let stored = store.get_record(item_id).await.unwrap().unwrap();
        assert_eq!(stored.item_type, "book");
        assert_eq!(stored.creators, new_record().creators);
        assert_eq!(stored.field("title"), "Sketch of the Analytical Engine");
        // publicationTitle is not a book field
        assert_eq!(stored.field("publicationTitle"), "");
        assert_eq!(stored.field("publisher"), "");
    }

    #[tokio::test]
    async fn test_rows_without_accepted_fields_are_skipped() {
        let (committer, store) = setup().await;
        let item_id = store.insert_record(&old_record()).await.unwrap();
        let mut row = snapshot(item_id, &old_record(), &new_record());
        for field in &mut row.fields {
            field.is_accepted = false;
        }

        let (report, saved) = committer.apply_accepted(&[row]).await;
        assert_eq!(report.skipped, 1);
        assert!(report.committed.is_empty());
        assert!(saved.is_empty());
        assert_eq!(store.version(item_id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_row() {
        let (committer, store) = setup().await;
        let good_id = store.insert_record(&old_record()).await.unwrap();

        let missing = snapshot(999, &old_record(), &new_record());
        let mut bad_type = snapshot(good_id, &old_record(), &new_record());
        for field in &mut bad_type.fields {
            if field.field_name == "itemType" {
                field.new_value = FieldValue::Text("spaceship".into());
            }
        }
        let good = snapshot(good_id, &old_record(), &new_record());

        let (report, _) = committer.apply_accepted(&[missing, bad_type, good]).await;
        assert_eq!(report.committed, vec![good_id]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].item_id, 999);
        assert!(report.failed[1].message.contains("spaceship"));
        assert!(report.has_failures());

        let stored = store.get_record(good_id).await.unwrap().unwrap();
        assert_eq!(stored.item_type, "journalArticle");
    }
}
