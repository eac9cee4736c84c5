//! Access to the document management service.
//!
//! The engine only ever talks to the store through the [`DocumentStore`]
//! trait: [`HttpStore`] is the REST client used in production, while
//! [`MemoryStore`] backs tests and offline dry runs.

mod http;
mod memory;
mod query;

pub use http::HttpStore;
pub use memory::MemoryStore;
pub use query::{DocumentQuery, DocumentSelector};

use metafix_model::{CustomFieldDef, Document, ItemKind, PatchFields, Result};

/// The document management service as the engine sees it.
pub trait DocumentStore {
    /// Fetches a single document, `None` if the id does not exist.
    fn get_document(&self, id: u64) -> Result<Option<Document>>;

    /// Fetches every document the selector covers.
    fn list_documents(&self, selector: &DocumentSelector) -> Result<Vec<Document>>;

    /// Applies a partial update to a document.
    fn patch_document(&self, id: u64, fields: &PatchFields) -> Result<()>;

    /// Resolves an item name to its id, `None` when no such item exists.
    fn resolve_name(&self, kind: ItemKind, name: &str) -> Result<Option<u64>>;

    /// Resolves an item id back to its name.
    fn item_name(&self, kind: ItemKind, id: u64) -> Result<Option<String>>;

    /// Looks up a custom-field definition by name.
    fn resolve_custom_field(&self, name: &str) -> Result<Option<CustomFieldDef>>;

    /// Counts documents matching a filter, without fetching them.
    fn count_documents(&self, query: &DocumentQuery) -> Result<u64>;
}
