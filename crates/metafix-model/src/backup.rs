//! Backup records: the pre-change values of every field a patch touched.
//!
//! A backup file is a multi-document YAML stream with one record per patched
//! document. Replaying a record against the store restores the prior state,
//! so a record must contain exactly the fields that were sent to the patch
//! call and nothing else.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The partial field set sent to a patch call, keyed by external field name.
pub type PatchFields = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: u64,
    #[serde(flatten)]
    pub fields: PatchFields,
}

impl BackupRecord {
    pub fn new(id: u64, fields: PatchFields) -> Self {
        Self { id, fields }
    }
}

/// Writes records as a `---`-separated YAML stream.
pub fn write_backup<W: Write>(mut writer: W, records: &[BackupRecord]) -> Result<()> {
    for record in records {
        writer.write_all(b"---\n")?;
        let doc = serde_yaml::to_string(record)?;
        writer.write_all(doc.as_bytes())?;
    }
    Ok(())
}

/// Reads every record from a YAML stream produced by [`write_backup`].
pub fn read_backup<R: BufRead>(reader: R) -> Result<Vec<BackupRecord>> {
    let mut records = Vec::new();
    for document in serde_yaml::Deserializer::from_reader(reader) {
        records.push(BackupRecord::deserialize(document)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_roundtrips_through_yaml_stream() {
        let mut fields = PatchFields::new();
        fields.insert("title".to_string(), serde_json::json!("old title"));
        fields.insert("tags".to_string(), serde_json::json!([3, 9]));
        let records = vec![
            BackupRecord::new(12, fields),
            BackupRecord::new(13, PatchFields::new()),
        ];

        let mut buffer = Vec::new();
        write_backup(&mut buffer, &records).unwrap();
        let restored = read_backup(buffer.as_slice()).unwrap();
        assert_eq!(restored, records);
    }

    #[test]
    fn record_flattens_fields_beside_id() {
        let mut fields = PatchFields::new();
        fields.insert("title".to_string(), serde_json::json!("old"));
        let yaml = serde_yaml::to_string(&BackupRecord::new(5, fields)).unwrap();
        assert!(yaml.contains("id: 5"));
        assert!(yaml.contains("title: old"));
    }
}
