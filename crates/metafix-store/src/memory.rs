//! In-memory store for tests and offline dry runs.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveDate};
use metafix_model::{CustomFieldDef, Document, ItemKind, MetafixError, PatchFields, Result};

use crate::query::{DocumentQuery, DocumentSelector};
use crate::DocumentStore;

/// A fixture store holding documents and named items in memory. Patches
/// are applied to the held documents and also recorded verbatim so tests
/// can assert on exactly what was written.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RefCell<BTreeMap<u64, Document>>,
    items: HashMap<(ItemKind, u64), String>,
    custom_fields: Vec<CustomFieldDef>,
    patches: RefCell<Vec<(u64, PatchFields)>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn with_document(self, document: Document) -> MemoryStore {
        self.documents.borrow_mut().insert(document.id, document);
        self
    }

    pub fn with_item(mut self, kind: ItemKind, id: u64, name: &str) -> MemoryStore {
        self.items.insert((kind, id), name.to_string());
        self
    }

    pub fn with_custom_field(mut self, def: CustomFieldDef) -> MemoryStore {
        self.custom_fields.push(def);
        self
    }

    /// Every patch applied so far, in order.
    pub fn patches(&self) -> Vec<(u64, PatchFields)> {
        self.patches.borrow().clone()
    }

    /// A copy of a held document, as the store would return it now.
    pub fn document(&self, id: u64) -> Option<Document> {
        self.documents.borrow().get(&id).cloned()
    }

    fn item_name_matches(&self, kind: ItemKind, id: Option<u64>, wanted: &str) -> bool {
        let Some(id) = id else { return false };
        self.items
            .get(&(kind, id))
            .is_some_and(|name| name.eq_ignore_ascii_case(wanted))
    }

    fn matches(&self, doc: &Document, query: &DocumentQuery) -> bool {
        if let Some(name) = &query.correspondent {
            if !self.item_name_matches(ItemKind::Correspondent, doc.correspondent, name) {
                return false;
            }
        }
        if let Some(name) = &query.document_type {
            if !self.item_name_matches(ItemKind::DocumentType, doc.document_type, name) {
                return false;
            }
        }
        if let Some(name) = &query.storage_path {
            if !self.item_name_matches(ItemKind::StoragePath, doc.storage_path, name) {
                return false;
            }
        }
        if let Some(title) = &query.title {
            if !doc.title.eq_ignore_ascii_case(title) {
                return false;
            }
        }
        if let Some(asn) = query.asn {
            if doc.archive_serial_number != Some(asn) {
                return false;
            }
        }
        let created = parse_date(&doc.created);
        let added = parse_date(&doc.added);
        date_matches(
            created,
            query.created_year,
            query.created_month,
            query.created_day,
            query.created_after,
            query.created_before,
        ) && date_matches(
            added,
            query.added_year,
            query.added_month,
            query.added_day,
            query.added_after,
            query.added_before,
        )
    }
}

fn date_matches(
    date: Option<NaiveDate>,
    year: Option<i64>,
    month: Option<i64>,
    day: Option<i64>,
    after: Option<NaiveDate>,
    before: Option<NaiveDate>,
) -> bool {
    if year.is_none() && month.is_none() && day.is_none() && after.is_none() && before.is_none() {
        return true;
    }
    let Some(date) = date else { return false };
    year.is_none_or(|y| i64::from(date.year()) == y)
        && month.is_none_or(|m| i64::from(date.month()) == m)
        && day.is_none_or(|d| i64::from(date.day()) == d)
        && after.is_none_or(|a| date > a)
        && before.is_none_or(|b| date < b)
}

/// Accepts both full timestamps and bare `YYYY-MM-DD` strings.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()
}

impl DocumentStore for MemoryStore {
    fn get_document(&self, id: u64) -> Result<Option<Document>> {
        Ok(self.documents.borrow().get(&id).cloned())
    }

    fn list_documents(&self, selector: &DocumentSelector) -> Result<Vec<Document>> {
        let documents = self.documents.borrow();
        match selector {
            DocumentSelector::All => Ok(documents.values().cloned().collect()),
            DocumentSelector::ById(id) => Ok(documents.get(id).cloned().into_iter().collect()),
            DocumentSelector::ByItem { kind, name } => {
                let id = self.resolve_name(*kind, name)?.ok_or_else(|| {
                    MetafixError::Store(format!("no {kind} named '{name}'"))
                })?;
                Ok(documents
                    .values()
                    .filter(|doc| match kind {
                        ItemKind::Correspondent => doc.correspondent == Some(id),
                        ItemKind::DocumentType => doc.document_type == Some(id),
                        ItemKind::StoragePath => doc.storage_path == Some(id),
                        ItemKind::Tag => doc.tags.contains(&id),
                    })
                    .cloned()
                    .collect())
            }
        }
    }

    fn patch_document(&self, id: u64, fields: &PatchFields) -> Result<()> {
        let mut documents = self.documents.borrow_mut();
        let doc = documents
            .get_mut(&id)
            .ok_or_else(|| MetafixError::Store(format!("no document {id}")))?;
        let mut value =
            serde_json::to_value(&*doc).map_err(|err| MetafixError::Store(err.to_string()))?;
        if let serde_json::Value::Object(map) = &mut value {
            for (key, field_value) in fields {
                map.insert(key.clone(), field_value.clone());
            }
        }
        *doc = serde_json::from_value(value).map_err(|err| MetafixError::Store(err.to_string()))?;
        self.patches.borrow_mut().push((id, fields.clone()));
        Ok(())
    }

    fn resolve_name(&self, kind: ItemKind, name: &str) -> Result<Option<u64>> {
        Ok(self
            .items
            .iter()
            .find(|((item_kind, _), item_name)| *item_kind == kind && item_name.as_str() == name)
            .map(|((_, id), _)| *id))
    }

    fn item_name(&self, kind: ItemKind, id: u64) -> Result<Option<String>> {
        Ok(self.items.get(&(kind, id)).cloned())
    }

    fn resolve_custom_field(&self, name: &str) -> Result<Option<CustomFieldDef>> {
        Ok(self
            .custom_fields
            .iter()
            .find(|field| field.name == name)
            .cloned())
    }

    fn count_documents(&self, query: &DocumentQuery) -> Result<u64> {
        let documents = self.documents.borrow();
        Ok(documents
            .values()
            .filter(|doc| self.matches(doc, query))
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: u64, correspondent: Option<u64>, created: &str) -> Document {
        Document {
            id,
            correspondent,
            title: format!("doc {id}"),
            created: created.to_string(),
            ..Document::default()
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_item(ItemKind::Correspondent, 3, "The Bank")
            .with_item(ItemKind::Tag, 9, "inbox")
            .with_document(doc(1, Some(3), "2020-05-15T10:00:00+00:00"))
            .with_document(doc(2, Some(3), "2021-01-02T10:00:00+00:00"))
            .with_document(doc(3, None, "2020-05-15"))
    }

    #[test]
    fn counts_by_name_and_date_components() {
        let store = store();
        let query = DocumentQuery {
            correspondent: Some("the bank".to_string()),
            created_year: Some(2020),
            ..DocumentQuery::default()
        };
        assert_eq!(store.count_documents(&query).unwrap(), 1);
    }

    #[test]
    fn lists_by_tag_membership() {
        let store = store().with_document(Document {
            id: 4,
            tags: vec![9],
            ..Document::default()
        });
        let selector = DocumentSelector::ByItem {
            kind: ItemKind::Tag,
            name: "inbox".to_string(),
        };
        let docs = store.list_documents(&selector).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, 4);
    }

    #[test]
    fn unknown_item_name_is_an_error() {
        let selector = DocumentSelector::ByItem {
            kind: ItemKind::Tag,
            name: "no-such-tag".to_string(),
        };
        assert!(store().list_documents(&selector).is_err());
    }

    #[test]
    fn patch_updates_the_held_document_and_is_recorded() {
        let store = store();
        let mut fields = PatchFields::new();
        fields.insert("title".to_string(), serde_json::json!("renamed"));
        fields.insert("created".to_string(), serde_json::json!("2019-03-01T12:00:00+00:00"));
        store.patch_document(1, &fields).unwrap();

        let doc = store.document(1).unwrap();
        assert_eq!(doc.title, "renamed");
        assert_eq!(doc.created, "2019-03-01T12:00:00+00:00");
        assert_eq!(store.patches().len(), 1);
        assert_eq!(store.patches()[0].0, 1);
    }
}
