//! The flat, name-keyed working record a document is projected into while
//! rules run against it.

use std::collections::BTreeMap;

use crate::fields;
use crate::value::Value;

/// One document's editable state, keyed by field name.
///
/// Besides the canonical fields (see [`crate::fields`]), extraction may add
/// arbitrary keys from named capture groups; later templates see those keys
/// like any other field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Rendered string form of a field, or the empty string when absent.
    pub fn rendered(&self, name: &str) -> String {
        self.entries.get(name).map(Value::render).unwrap_or_default()
    }

    /// Splits into the writable and read-only subsets. Rules transform the
    /// writable half; the read-only half is carried through unchanged.
    pub fn split_read_only(&self) -> (Metadata, Metadata) {
        let mut writable = Metadata::new();
        let mut read_only = Metadata::new();
        for (name, value) in &self.entries {
            if fields::is_read_only(name) {
                read_only.set(name.clone(), value.clone());
            } else {
                writable.set(name.clone(), value.clone());
            }
        }
        (writable, read_only)
    }

    /// Union of `self` and `other`, with `other` winning on key collision.
    pub fn merged_with(&self, other: &Metadata) -> Metadata {
        let mut merged = self.clone();
        for (name, value) in &other.entries {
            merged.set(name.clone(), value.clone());
        }
        merged
    }

    /// Returns whether any field of `self` differs from (or is missing in)
    /// `other`.
    pub fn differs_from(&self, other: &Metadata) -> bool {
        self.entries
            .iter()
            .any(|(name, value)| other.get(name) != Some(value))
    }
}

impl FromIterator<(String, Value)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Metadata {
            entries: iter.into_iter().collect(),
        }
    }
}
