//! Record and review-row model shared between the queue core and its observers
//!
//! `Record` is the bibliographic item snapshot exchanged with storage and the
//! metadata source. `RowSnapshot` is the immutable view of one queue row pushed
//! to observers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable identifier of a stored item
pub type ItemId = i64;

/// One creator of a record (author, editor, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    /// Role key, e.g. "author", "editor"
    pub creator_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    /// Last name, or the full name for single-field creators
    #[serde(default, alias = "name", skip_serializing_if = "String::is_empty")]
    pub last_name: String,
}

impl Creator {
    pub fn new(
        creator_type: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            creator_type: creator_type.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// "First Last" when both parts exist, otherwise whichever part is present
    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (true, false) => self.last_name.clone(),
            (false, true) => self.first_name.clone(),
            (true, true) => String::new(),
        }
    }
}

/// Bibliographic record snapshot
///
/// Serializes to the flat JSON shape used by citation tools:
/// `{ "itemType": "book", "creators": [...], "title": "...", ... }`.
/// Non-string scalar values in incoming JSON are kept as their JSON text;
/// arrays and objects other than `creators` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordRepr", into = "RecordRepr")]
pub struct Record {
    pub item_type: String,
    pub creators: Vec<Creator>,
    /// Field name -> value. Absent and empty are equivalent.
    pub fields: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRepr {
    item_type: String,
    #[serde(default)]
    creators: Vec<Creator>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl From<RecordRepr> for Record {
    fn from(repr: RecordRepr) -> Self {
        let fields = repr
            .rest
            .into_iter()
            .filter_map(|(name, value)| match value {
                serde_json::Value::String(s) => Some((name, s)),
                serde_json::Value::Number(n) => Some((name, n.to_string())),
                serde_json::Value::Bool(b) => Some((name, b.to_string())),
                _ => None,
            })
            .filter(|(_, value)| !value.is_empty())
            .collect();

        Self {
            item_type: repr.item_type,
            creators: repr.creators,
            fields,
        }
    }
}

impl From<Record> for RecordRepr {
    fn from(record: Record) -> Self {
        Self {
            item_type: record.item_type,
            creators: record.creators,
            rest: record
                .fields
                .into_iter()
                .map(|(name, value)| (name, serde_json::Value::String(value)))
                .collect(),
        }
    }
}

impl Record {
    pub fn new(item_type: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            ..Default::default()
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Builder-style creator append
    pub fn with_creator(mut self, creator: Creator) -> Self {
        self.creators.push(creator);
        self
    }

    /// Field value, empty string when absent
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn title(&self) -> String {
        self.field("title").to_string()
    }

    /// Set a field; an empty value removes it
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if value.is_empty() {
            self.fields.remove(&name);
        } else {
            self.fields.insert(name, value);
        }
    }

    /// Replace the creator list wholesale
    pub fn replace_creators(&mut self, creators: Vec<Creator>) {
        self.creators = creators;
    }

    /// Change the record type, dropping fields the new type does not carry
    pub fn set_type(&mut self, item_type: impl Into<String>, valid_fields: &[String]) {
        self.item_type = item_type.into();
        self.fields
            .retain(|name, _| valid_fields.iter().any(|valid| valid == name));
    }
}

/// Raw value of a diffed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Creators(Vec<Creator>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Creators(_) => None,
        }
    }

    pub fn as_creators(&self) -> Option<&[Creator]> {
        match self {
            FieldValue::Creators(c) => Some(c),
            FieldValue::Text(_) => None,
        }
    }
}

/// One differing field between the stored record and the fetched record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Canonical field key, or the synthetic keys `creators` / `itemType`
    pub field_name: String,
    pub field_label: String,
    pub old_value: FieldValue,
    pub old_label: String,
    pub new_value: FieldValue,
    pub new_label: String,
    pub is_accepted: bool,
}

/// Row lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Queued,
    Processing,
    Failed,
    Succeeded,
}

impl RowStatus {
    /// Succeeded or Failed
    pub fn is_terminal(self) -> bool {
        matches!(self, RowStatus::Succeeded | RowStatus::Failed)
    }
}

/// Immutable view of one queue row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub item_id: ItemId,
    pub status: RowStatus,
    pub title: String,
    pub message: String,
    pub fields: Vec<FieldDiff>,
}

impl RowSnapshot {
    pub fn field(&self, field_name: &str) -> Option<&FieldDiff> {
        self.fields.iter().find(|f| f.field_name == field_name)
    }

    pub fn has_accepted_fields(&self) -> bool {
        self.fields.iter().any(|f| f.is_accepted)
    }
}

/// Processed/total counters for the progress meter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueProgress {
    pub total: usize,
    pub processed: usize,
}

impl QueueProgress {
    pub fn from_rows(rows: &[RowSnapshot]) -> Self {
        Self {
            total: rows.len(),
            processed: rows.iter().filter(|r| r.status.is_terminal()).count(),
        }
    }

    /// All rows reached a terminal status (an empty queue counts as finished)
    pub fn is_finished(&self) -> bool {
        self.processed == self.total
    }

    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed as f64 * 100.0 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creator_display_name_parts() {
        assert_eq!(Creator::new("author", "Ada", "Lovelace").display_name(), "Ada Lovelace");
        assert_eq!(Creator::new("author", "", "Lovelace").display_name(), "Lovelace");
        assert_eq!(Creator::new("author", "Ada", "").display_name(), "Ada");
        assert_eq!(Creator::new("author", "", "").display_name(), "");
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::json!({
            "itemType": "book",
            "creators": [{ "creatorType": "author", "firstName": "Ada", "lastName": "Lovelace" }],
            "title": "Notes",
            "numPages": 42,
            "tags": [],
            "abstractNote": ""
        });

        let record: Record = serde_json::from_value(json).unwrap();
        assert_eq!(record.item_type, "book");
        assert_eq!(record.creators.len(), 1);
        assert_eq!(record.field("title"), "Notes");
        assert_eq!(record.field("numPages"), "42");
        assert!(!record.fields.contains_key("tags"));
        assert!(!record.fields.contains_key("abstractNote"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["itemType"], "book");
        assert_eq!(back["title"], "Notes");
        assert_eq!(back["creators"][0]["lastName"], "Lovelace");
    }

    #[test]
    fn test_single_field_creator_name_alias() {
        let creator: Creator =
            serde_json::from_str(r#"{"creatorType":"author","name":"ACME Corp"}"#).unwrap();
        assert_eq!(creator.last_name, "ACME Corp");
        assert_eq!(creator.display_name(), "ACME Corp");
    }

    #[test]
    fn test_set_type_drops_invalid_fields() {
        let mut record = Record::new("book")
            .with_field("title", "T")
            .with_field("publisher", "P");

        record.set_type("webpage", &["title".to_string(), "url".to_string()]);

        assert_eq!(record.item_type, "webpage");
        assert_eq!(record.field("title"), "T");
        assert_eq!(record.field("publisher"), "");
    }

    #[test]
    fn test_set_field_empty_removes() {
        let mut record = Record::new("book").with_field("title", "T");
        record.set_field("title", "");
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_progress_counts_terminal_rows() {
        let row = |status| RowSnapshot {
            item_id: 1,
            status,
            title: String::new(),
            message: String::new(),
            fields: vec![],
        };
        let rows = vec![
            row(RowStatus::Succeeded),
            row(RowStatus::Failed),
            row(RowStatus::Processing),
            row(RowStatus::Queued),
        ];

        let progress = QueueProgress::from_rows(&rows);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.processed, 2);
        assert!(!progress.is_finished());
        assert_eq!(progress.percentage(), 50.0);
        assert!(QueueProgress::default().is_finished());
    }
}
