//! Item-type / field schema
//!
//! Answers which fields a record type carries (in display order), the
//! localized labels of fields, types and creator roles, and canonical type ids.
//! The diff computer and the apply committer only see the `ItemSchema` trait.

use bibup_common::{Error, Record, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Canonical numeric id of an item type
pub type TypeId = u16;

/// Synthetic field key for the composite creator list
pub const CREATORS_FIELD: &str = "creators";
/// Synthetic field key for the record type
pub const ITEM_TYPE_FIELD: &str = "itemType";
/// Field never diffed or written (last-access timestamp)
pub const EXCLUDED_FIELD: &str = "accessDate";

/// Type/field schema collaborator
pub trait ItemSchema: Send + Sync {
    /// Fields valid for a type, in display order. Unknown types have none.
    fn fields_for_type(&self, item_type: &str) -> Vec<String>;

    fn field_label(&self, field_name: &str) -> String;

    fn type_label(&self, item_type: &str) -> String;

    fn creator_type_label(&self, creator_type: &str) -> String;

    fn canonical_type_id(&self, item_type: &str) -> Option<TypeId>;

    /// Regular items are bibliographic records (not notes, attachments, ...)
    fn is_regular_type(&self, item_type: &str) -> bool;

    fn is_valid_field_for_type(&self, field_name: &str, item_type: &str) -> bool {
        self.fields_for_type(item_type).iter().any(|f| f == field_name)
    }
}

/// Default enqueue predicate: only regular items can be updated
pub fn can_update(schema: &dyn ItemSchema, record: &Record) -> bool {
    schema.is_regular_type(&record.item_type)
}

/// One item type in a schema definition
#[derive(Debug, Clone, Deserialize)]
pub struct ItemTypeDefinition {
    pub name: String,
    pub label: String,
    pub fields: Vec<String>,
    #[serde(default = "default_regular")]
    pub regular: bool,
}

fn default_regular() -> bool {
    true
}

/// Serialized schema definition (JSON)
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaDefinition {
    pub item_types: Vec<ItemTypeDefinition>,
    #[serde(default)]
    pub field_labels: HashMap<String, String>,
    #[serde(default)]
    pub creator_type_labels: HashMap<String, String>,
}

/// Table-driven schema, either built in or loaded from JSON
#[derive(Debug, Clone)]
pub struct TableSchema {
    types: Vec<ItemTypeDefinition>,
    field_labels: HashMap<String, String>,
    creator_type_labels: HashMap<String, String>,
}

impl TableSchema {
    pub fn from_definition(definition: SchemaDefinition) -> Self {
        Self {
            types: definition.item_types,
            field_labels: definition.field_labels,
            creator_type_labels: definition.creator_type_labels,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let definition: SchemaDefinition = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid schema definition: {}", e)))?;
        if definition.item_types.is_empty() {
            return Err(Error::Config("Schema defines no item types".to_string()));
        }
        Ok(Self::from_definition(definition))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Built-in bibliographic schema with English labels
    pub fn builtin() -> Self {
        let def = |name: &str, label: &str, fields: &[&str], regular: bool| ItemTypeDefinition {
            name: name.to_string(),
            label: label.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            regular,
        };

        let types = vec![
            def(
                "book",
                "Book",
                &[
                    "title", "abstractNote", "series", "seriesNumber", "volume",
                    "numberOfVolumes", "edition", "place", "publisher", "date", "numPages",
                    "language", "ISBN", "shortTitle", "url", "accessDate", "archive",
                    "archiveLocation", "libraryCatalog", "callNumber", "rights", "extra",
                ],
                true,
            ),
            def(
                "bookSection",
                "Book Section",
                &[
                    "title", "abstractNote", "bookTitle", "series", "seriesNumber", "volume",
                    "numberOfVolumes", "edition", "place", "publisher", "date", "pages",
                    "language", "ISBN", "shortTitle", "url", "accessDate", "archive",
                    "archiveLocation", "libraryCatalog", "callNumber", "rights", "extra",
                ],
                true,
            ),
            def(
                "journalArticle",
                "Journal Article",
                &[
                    "title", "abstractNote", "publicationTitle", "volume", "issue", "pages",
                    "date", "series", "seriesTitle", "seriesText", "journalAbbreviation",
                    "language", "DOI", "ISSN", "shortTitle", "url", "accessDate", "archive",
                    "archiveLocation", "libraryCatalog", "callNumber", "rights", "extra",
                ],
                true,
            ),
            def(
                "magazineArticle",
                "Magazine Article",
                &[
                    "title", "abstractNote", "publicationTitle", "volume", "issue", "date",
                    "pages", "language", "ISSN", "shortTitle", "url", "accessDate", "archive",
                    "archiveLocation", "libraryCatalog", "callNumber", "rights", "extra",
                ],
                true,
            ),
            def(
                "newspaperArticle",
                "Newspaper Article",
                &[
                    "title", "abstractNote", "publicationTitle", "place", "edition", "date",
                    "section", "pages", "language", "shortTitle", "ISSN", "url", "accessDate",
                    "archive", "archiveLocation", "libraryCatalog", "callNumber", "rights",
                    "extra",
                ],
                true,
            ),
            def(
                "thesis",
                "Thesis",
                &[
                    "title", "abstractNote", "thesisType", "university", "place", "date",
                    "numPages", "language", "shortTitle", "url", "accessDate", "archive",
                    "archiveLocation", "libraryCatalog", "callNumber", "rights", "extra",
                ],
                true,
            ),
            def(
                "report",
                "Report",
                &[
                    "title", "abstractNote", "reportNumber", "reportType", "seriesTitle",
                    "place", "institution", "date", "pages", "language", "shortTitle", "url",
                    "accessDate", "archive", "archiveLocation", "libraryCatalog", "callNumber",
                    "rights", "extra",
                ],
                true,
            ),
            def(
                "conferencePaper",
                "Conference Paper",
                &[
                    "title", "abstractNote", "date", "proceedingsTitle", "conferenceName",
                    "place", "publisher", "volume", "pages", "series", "language", "DOI",
                    "ISBN", "shortTitle", "url", "accessDate", "archive", "archiveLocation",
                    "libraryCatalog", "callNumber", "rights", "extra",
                ],
                true,
            ),
            def(
                "webpage",
                "Web Page",
                &[
                    "title", "abstractNote", "websiteTitle", "websiteType", "date",
                    "shortTitle", "url", "accessDate", "language", "rights", "extra",
                ],
                true,
            ),
            def("note", "Note", &[], false),
            def("attachment", "Attachment", &["title", "accessDate", "url"], false),
            def("annotation", "Annotation", &[], false),
        ];

        let field_labels = [
            (ITEM_TYPE_FIELD, "Item Type"),
            (CREATORS_FIELD, "Creators"),
            ("title", "Title"),
            ("abstractNote", "Abstract"),
            ("series", "Series"),
            ("seriesNumber", "Series Number"),
            ("seriesTitle", "Series Title"),
            ("seriesText", "Series Text"),
            ("volume", "Volume"),
            ("numberOfVolumes", "# of Volumes"),
            ("edition", "Edition"),
            ("place", "Place"),
            ("publisher", "Publisher"),
            ("date", "Date"),
            ("numPages", "# of Pages"),
            ("pages", "Pages"),
            ("language", "Language"),
            ("ISBN", "ISBN"),
            ("ISSN", "ISSN"),
            ("DOI", "DOI"),
            ("shortTitle", "Short Title"),
            ("url", "URL"),
            ("accessDate", "Accessed"),
            ("archive", "Archive"),
            ("archiveLocation", "Loc. in Archive"),
            ("libraryCatalog", "Library Catalog"),
            ("callNumber", "Call Number"),
            ("rights", "Rights"),
            ("extra", "Extra"),
            ("bookTitle", "Book Title"),
            ("publicationTitle", "Publication"),
            ("issue", "Issue"),
            ("journalAbbreviation", "Journal Abbr"),
            ("section", "Section"),
            ("thesisType", "Type"),
            ("university", "University"),
            ("reportNumber", "Report Number"),
            ("reportType", "Report Type"),
            ("institution", "Institution"),
            ("proceedingsTitle", "Proceedings Title"),
            ("conferenceName", "Conference Name"),
            ("websiteTitle", "Website Title"),
            ("websiteType", "Website Type"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let creator_type_labels = [
            ("author", "Author"),
            ("contributor", "Contributor"),
            ("editor", "Editor"),
            ("seriesEditor", "Series Editor"),
            ("translator", "Translator"),
            ("bookAuthor", "Book Author"),
            ("reviewedAuthor", "Reviewed Author"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            types,
            field_labels,
            creator_type_labels,
        }
    }

    fn find_type(&self, item_type: &str) -> Option<&ItemTypeDefinition> {
        self.types.iter().find(|t| t.name == item_type)
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ItemSchema for TableSchema {
    fn fields_for_type(&self, item_type: &str) -> Vec<String> {
        self.find_type(item_type)
            .map(|t| t.fields.clone())
            .unwrap_or_default()
    }

    fn field_label(&self, field_name: &str) -> String {
        self.field_labels
            .get(field_name)
            .cloned()
            .unwrap_or_else(|| field_name.to_string())
    }

    fn type_label(&self, item_type: &str) -> String {
        self.find_type(item_type)
            .map(|t| t.label.clone())
            .unwrap_or_else(|| item_type.to_string())
    }

    fn creator_type_label(&self, creator_type: &str) -> String {
        self.creator_type_labels
            .get(creator_type)
            .cloned()
            .unwrap_or_else(|| creator_type.to_string())
    }

    fn canonical_type_id(&self, item_type: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.name == item_type)
            .and_then(|idx| TypeId::try_from(idx + 1).ok())
    }

    fn is_regular_type(&self, item_type: &str) -> bool {
        self.find_type(item_type).map(|t| t.regular).unwrap_or(false)
    }
}
