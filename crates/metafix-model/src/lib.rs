pub mod backup;
pub mod document;
pub mod error;
pub mod fields;
pub mod metadata;
pub mod value;

pub use backup::{BackupRecord, PatchFields, read_backup, write_backup};
pub use document::{CustomFieldDef, CustomFieldEntry, Document, ItemKind};
pub use error::{MetafixError, Result};
pub use metadata::Metadata;
pub use value::Value;
