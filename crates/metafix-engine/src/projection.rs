//! Projection between the store's id-keyed document records and the flat,
//! name-keyed metadata the rules operate on.

use chrono::{DateTime, Datelike, NaiveDate};
use metafix_model::{Document, ItemKind, Metadata, PatchFields, Result, Value, fields};
use metafix_store::DocumentStore;
use tracing::warn;

/// Projects a document into the working record: classification ids become
/// names, timestamps are split into zero-padded year/month/day components,
/// custom-field slots become a list of `{field, value}` maps.
pub fn working_metadata(document: &Document, store: &dyn DocumentStore) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    metadata.set(
        fields::CORRESPONDENT,
        item_name_value(store, ItemKind::Correspondent, document.correspondent)?,
    );
    metadata.set(
        fields::DOCUMENT_TYPE,
        item_name_value(store, ItemKind::DocumentType, document.document_type)?,
    );
    metadata.set(
        fields::STORAGE_PATH,
        item_name_value(store, ItemKind::StoragePath, document.storage_path)?,
    );
    metadata.set(
        fields::ASN,
        document
            .archive_serial_number
            .map_or(Value::None, Value::Int),
    );

    let mut tag_names = Vec::new();
    for tag in &document.tags {
        match store.item_name(ItemKind::Tag, *tag)? {
            Some(name) => tag_names.push(Value::from(name)),
            None => warn!(document = document.id, tag, "unknown tag id"),
        }
    }
    metadata.set(fields::TAG_LIST, Value::List(tag_names));

    metadata.set(fields::TITLE, Value::from(document.title.clone()));

    metadata.set(fields::CREATED, Value::from(document.created.clone()));
    if let Some(created) = stamp_date(&document.created) {
        metadata.set(fields::CREATED_YEAR, Value::from(format!("{:04}", created.year())));
        metadata.set(fields::CREATED_MONTH, Value::from(format!("{:02}", created.month())));
        metadata.set(fields::CREATED_DAY, Value::from(format!("{:02}", created.day())));
        metadata.set(
            fields::CREATED_DATE,
            Value::from(created.format("%Y-%m-%d").to_string()),
        );
        metadata.set(fields::CREATED_DATE_OBJECT, Value::Date(created));
    }

    metadata.set(fields::ADDED, Value::from(document.added.clone()));
    if let Some(added) = stamp_date(&document.added) {
        metadata.set(fields::ADDED_YEAR, Value::from(format!("{:04}", added.year())));
        metadata.set(fields::ADDED_MONTH, Value::from(format!("{:02}", added.month())));
        metadata.set(fields::ADDED_DAY, Value::from(format!("{:02}", added.day())));
    }

    let slots: Vec<Value> = document
        .custom_fields
        .iter()
        .map(|entry| {
            Value::Map(
                [
                    ("field".to_string(), Value::Int(entry.field as i64)),
                    ("value".to_string(), Value::from_json(&entry.value)),
                ]
                .into_iter()
                .collect(),
            )
        })
        .collect();
    metadata.set(fields::CUSTOM_FIELDS, Value::List(slots));
    metadata.set(fields::DOCUMENT_ID, Value::Int(document.id as i64));

    Ok(metadata)
}

/// Maps the working record back to the store's field shapes: names resolve
/// to ids, the tag-name list becomes a tag-id list, and `created_date` is
/// recomputed from `created`.
pub fn record_fields(metadata: &Metadata, store: &dyn DocumentStore) -> Result<PatchFields> {
    let mut record = PatchFields::new();
    record.insert(
        "correspondent".to_string(),
        item_id_json(store, ItemKind::Correspondent, metadata.get(fields::CORRESPONDENT))?,
    );
    record.insert(
        "document_type".to_string(),
        item_id_json(store, ItemKind::DocumentType, metadata.get(fields::DOCUMENT_TYPE))?,
    );
    record.insert(
        "storage_path".to_string(),
        item_id_json(store, ItemKind::StoragePath, metadata.get(fields::STORAGE_PATH))?,
    );
    record.insert(
        "archive_serial_number".to_string(),
        asn_json(metadata.get(fields::ASN)),
    );

    let mut tags = Vec::new();
    if let Some(Value::List(names)) = metadata.get(fields::TAG_LIST) {
        for name in names {
            let rendered = name.render();
            match store.resolve_name(ItemKind::Tag, &rendered)? {
                Some(id) => tags.push(serde_json::Value::from(id)),
                None => warn!(tag = rendered, "unknown tag name, dropped from outgoing tag list"),
            }
        }
    }
    record.insert("tags".to_string(), serde_json::Value::Array(tags));

    record.insert(
        "title".to_string(),
        serde_json::Value::String(metadata.rendered(fields::TITLE)),
    );

    let created = metadata.rendered(fields::CREATED);
    let created_date = stamp_date(&created)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| metadata.rendered(fields::CREATED_DATE));
    record.insert("created".to_string(), serde_json::Value::String(created));
    record.insert(
        "created_date".to_string(),
        serde_json::Value::String(created_date),
    );
    record.insert(
        "added".to_string(),
        serde_json::Value::String(metadata.rendered(fields::ADDED)),
    );

    if let Some(slots @ Value::List(_)) = metadata.get(fields::CUSTOM_FIELDS) {
        record.insert("custom_fields".to_string(), slots.to_json());
    }

    Ok(record)
}

/// Accepts both full timestamps and bare `YYYY-MM-DD` strings.
fn stamp_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()
}

fn item_name_value(
    store: &dyn DocumentStore,
    kind: ItemKind,
    id: Option<u64>,
) -> Result<Value> {
    Ok(match id {
        Some(id) => store
            .item_name(kind, id)?
            .map_or(Value::None, Value::from),
        None => Value::None,
    })
}

fn item_id_json(
    store: &dyn DocumentStore,
    kind: ItemKind,
    name: Option<&Value>,
) -> Result<serde_json::Value> {
    let name = match name {
        None | Some(Value::None) => return Ok(serde_json::Value::Null),
        Some(value) => value.render(),
    };
    match store.resolve_name(kind, &name)? {
        Some(id) => Ok(serde_json::Value::from(id)),
        None => {
            warn!(%kind, name, "unknown item name, field will be cleared");
            Ok(serde_json::Value::Null)
        }
    }
}

/// The serial number stays numeric when it still parses as one.
fn asn_json(value: Option<&Value>) -> serde_json::Value {
    match value {
        None | Some(Value::None) => serde_json::Value::Null,
        Some(value) => match value.as_int() {
            Some(n) => serde_json::Value::from(n),
            None => serde_json::Value::String(value.render()),
        },
    }
}
