//! Canonical field names of the working metadata record.
//!
//! Rules see documents through a flat, name-keyed record. A fixed subset of
//! those fields is read-only: rules may read them in match predicates and
//! templates, but neither extraction nor postprocessing may overwrite them.

pub const CORRESPONDENT: &str = "correspondent";
pub const DOCUMENT_TYPE: &str = "document_type";
pub const STORAGE_PATH: &str = "storage_path";
pub const TAG_LIST: &str = "tag_list";
pub const ASN: &str = "asn";
pub const TITLE: &str = "title";
pub const CREATED: &str = "created";
pub const CREATED_DATE: &str = "created_date";
pub const CREATED_DATE_OBJECT: &str = "created_date_object";
pub const CREATED_YEAR: &str = "created_year";
pub const CREATED_MONTH: &str = "created_month";
pub const CREATED_DAY: &str = "created_day";
pub const ADDED: &str = "added";
pub const ADDED_YEAR: &str = "added_year";
pub const ADDED_MONTH: &str = "added_month";
pub const ADDED_DAY: &str = "added_day";
pub const CUSTOM_FIELDS: &str = "custom_fields";
pub const DOCUMENT_ID: &str = "document_id";

/// Fields a rule may never produce. They are carried through processing
/// unchanged and win on key collision when the writable set is merged back.
pub const READ_ONLY_FIELDS: &[&str] = &[
    CORRESPONDENT,
    DOCUMENT_TYPE,
    STORAGE_PATH,
    TAG_LIST,
    ADDED,
    ADDED_YEAR,
    ADDED_MONTH,
    ADDED_DAY,
    DOCUMENT_ID,
];

/// Returns whether `name` is one of the read-only metadata fields.
pub fn is_read_only(name: &str) -> bool {
    READ_ONLY_FIELDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_components_are_writable() {
        assert!(!is_read_only(CREATED_YEAR));
        assert!(!is_read_only(CREATED_MONTH));
        assert!(!is_read_only(CREATED_DAY));
        assert!(!is_read_only(TITLE));
    }

    #[test]
    fn added_components_are_read_only() {
        assert!(is_read_only(ADDED));
        assert!(is_read_only(ADDED_YEAR));
        assert!(is_read_only(TAG_LIST));
        assert!(is_read_only(DOCUMENT_ID));
    }
}
