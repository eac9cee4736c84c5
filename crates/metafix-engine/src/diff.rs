//! Field-level diffing between an outgoing record and the live document.

use metafix_model::{Document, MetafixError, PatchFields, Result};

/// The document's current state as a JSON field map, the shape diffs and
/// backups are computed in.
pub fn document_json(document: &Document) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(document) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(MetafixError::Message("document did not serialize to a map".to_string())),
        Err(err) => Err(MetafixError::Message(err.to_string())),
    }
}

/// Names of the record fields whose values differ from the live document.
/// A field equal to its current value never appears.
pub fn changed_keys(
    record: &PatchFields,
    document: &serde_json::Map<String, serde_json::Value>,
) -> Vec<String> {
    record
        .iter()
        .filter(|(key, value)| document.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Appends a tag id to the record's outgoing tag list, at most once.
pub fn append_tag(record: &mut PatchFields, tag: u64) {
    if let Some(serde_json::Value::Array(tags)) = record.get_mut("tags") {
        let tag = serde_json::Value::from(tag);
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PatchFields {
        let mut record = PatchFields::new();
        record.insert("title".to_string(), serde_json::json!("scan_0001"));
        record.insert("tags".to_string(), serde_json::json!([3, 9]));
        record.insert("archive_serial_number".to_string(), serde_json::json!(120));
        record
    }

    fn document() -> Document {
        Document {
            id: 1,
            title: "scan_0001".to_string(),
            tags: vec![3, 9],
            archive_serial_number: Some(120),
            ..Document::default()
        }
    }

    #[test]
    fn unchanged_fields_never_appear() {
        let doc = document_json(&document()).unwrap();
        assert!(changed_keys(&record(), &doc).is_empty());
    }

    #[test]
    fn changed_and_unknown_fields_appear() {
        let mut rec = record();
        rec.insert("title".to_string(), serde_json::json!("renamed"));
        let doc = document_json(&document()).unwrap();
        assert_eq!(changed_keys(&rec, &doc), vec!["title"]);
    }

    #[test]
    fn append_tag_is_idempotent() {
        let mut rec = record();
        append_tag(&mut rec, 7);
        append_tag(&mut rec, 7);
        assert_eq!(rec.get("tags"), Some(&serde_json::json!([3, 9, 7])));
    }
}
