//! Batch postprocessing of document metadata.
//!
//! Ties the pieces together: documents are projected into the working
//! metadata record, the ruleset rewrites it, the result is diffed against
//! the live document, and minimal patches go back to the store with a
//! backup record per patch.

mod diff;
mod processor;
mod projection;

pub use diff::{append_tag, changed_keys, document_json};
pub use processor::{Options, Postprocessor, restore};
pub use projection::{record_fields, working_metadata};
