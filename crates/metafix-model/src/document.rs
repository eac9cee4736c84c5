//! External record shapes exchanged with the document store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A document as the store returns it: classification fields are numeric
/// identifiers, dates are the store's timestamp strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    #[serde(default)]
    pub correspondent: Option<u64>,
    #[serde(default)]
    pub document_type: Option<u64>,
    #[serde(default)]
    pub storage_path: Option<u64>,
    #[serde(default)]
    pub archive_serial_number: Option<i64>,
    #[serde(default)]
    pub tags: Vec<u64>,
    #[serde(default)]
    pub title: String,
    /// Full creation timestamp, e.g. `2020-05-15T10:00:00+00:00`.
    #[serde(default)]
    pub created: String,
    /// Creation date in `YYYY-MM-DD` form, kept in sync with `created`.
    #[serde(default)]
    pub created_date: String,
    #[serde(default)]
    pub added: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldEntry>,
}

/// One custom-field slot on a document: the field definition id plus the
/// stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldEntry {
    pub field: u64,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A custom-field definition as resolved by name through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub data_type: Option<String>,
}

/// The named-item categories the store can resolve between names and ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Correspondent,
    DocumentType,
    StoragePath,
    Tag,
}

impl ItemKind {
    /// The store's collection name for this category.
    pub fn collection(&self) -> &'static str {
        match self {
            ItemKind::Correspondent => "correspondents",
            ItemKind::DocumentType => "document_types",
            ItemKind::StoragePath => "storage_paths",
            ItemKind::Tag => "tags",
        }
    }

    /// The query field selecting documents by an item of this category.
    pub fn document_filter_field(&self) -> &'static str {
        match self {
            ItemKind::Correspondent => "correspondent__id",
            ItemKind::DocumentType => "document_type__id",
            ItemKind::StoragePath => "storage_path__id",
            ItemKind::Tag => "tags__id",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemKind::Correspondent => "correspondent",
            ItemKind::DocumentType => "document_type",
            ItemKind::StoragePath => "storage_path",
            ItemKind::Tag => "tag",
        };
        write!(f, "{name}")
    }
}
