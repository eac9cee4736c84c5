//! The postprocessing orchestrator: runs the ruleset over a batch of
//! documents, patches what changed, and collects backup records.

use metafix_expr::{DocumentCounts, Environment, EvalError, EvalResult};
use metafix_model::{BackupRecord, Document, ItemKind, Metadata, PatchFields, Result, Value};
use metafix_rules::{Ruleset, Validation};
use metafix_store::{DocumentQuery, DocumentStore};
use tracing::{debug, error, info, warn};

use crate::diff::{append_tag, changed_keys, document_json};
use crate::projection::{record_fields, working_metadata};

/// Run-wide switches, resolved once into a [`Postprocessor`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Tag applied to any document the run changed.
    pub postprocessing_tag: Option<String>,
    /// Tag applied to documents failing validation. Validation only runs
    /// when this is set.
    pub invalid_tag: Option<String>,
    /// Compute and log changes without patching anything.
    pub simulate: bool,
    pub skip_validation: bool,
}

/// Adapts the store's count query to the template language's
/// `num_documents` global.
struct StoreCounts<'a> {
    store: &'a dyn DocumentStore,
}

impl DocumentCounts for StoreCounts<'_> {
    fn count(&self, constraints: &[(String, Value)]) -> EvalResult<u64> {
        let query = DocumentQuery::from_constraints(constraints).map_err(EvalError::Count)?;
        self.store
            .count_documents(&query)
            .map_err(|err| EvalError::Count(err.to_string()))
    }
}

pub struct Postprocessor<'a> {
    store: &'a dyn DocumentStore,
    ruleset: &'a Ruleset,
    postprocessing_tag_id: Option<u64>,
    invalid_tag_id: Option<u64>,
    simulate: bool,
    skip_validation: bool,
}

impl<'a> Postprocessor<'a> {
    /// Resolves the configured tag names once; a name that does not exist
    /// disables its feature with a warning.
    pub fn new(
        store: &'a dyn DocumentStore,
        ruleset: &'a Ruleset,
        options: &Options,
    ) -> Result<Postprocessor<'a>> {
        Ok(Postprocessor {
            store,
            ruleset,
            postprocessing_tag_id: resolve_tag(store, options.postprocessing_tag.as_deref())?,
            invalid_tag_id: resolve_tag(store, options.invalid_tag.as_deref())?,
            simulate: options.simulate,
            skip_validation: options.skip_validation,
        })
    }

    /// Processes a batch. Failures are isolated per document; the returned
    /// backup records cover every patch the run issued.
    pub fn process(&self, documents: &[Document]) -> Result<Vec<BackupRecord>> {
        let counts = StoreCounts { store: self.store };
        let env = Environment::new(&counts);
        let mut backups = Vec::new();
        let mut invalid = 0usize;

        for document in documents {
            if let Err(err) = self.process_one(document, &env, &mut backups, &mut invalid) {
                error!(document = document.id, error = %err, "processing failed");
            }
        }

        if invalid > 0 {
            warn!(invalid, total = documents.len(), "found invalid documents");
        }
        Ok(backups)
    }

    fn process_one(
        &self,
        document: &Document,
        env: &Environment<'_>,
        backups: &mut Vec<BackupRecord>,
        invalid: &mut usize,
    ) -> Result<()> {
        let original = working_metadata(document, self.store)?;
        let new = self.run_rules(&original, &document.content, env);

        if original.differs_from(&new) {
            let mut record = record_fields(&new, self.store)?;
            let doc_json = document_json(document)?;
            let mut changed = changed_keys(&record, &doc_json);

            if !changed.is_empty() {
                if let Some(tag) = self.postprocessing_tag_id {
                    append_tag(&mut record, tag);
                    changed = changed_keys(&record, &doc_json);
                }
            }

            if changed.is_empty() {
                info!(document = document.id, "no metadata changes");
            } else {
                for key in &changed {
                    info!(
                        document = document.id,
                        field = %key,
                        old = %doc_json.get(key).cloned().unwrap_or(serde_json::Value::Null),
                        new = %record.get(key).cloned().unwrap_or(serde_json::Value::Null),
                        "change"
                    );
                }
                if !self.simulate {
                    // created_date is recomputed from created and always
                    // rides along with the patch.
                    let mut keys = changed;
                    keys.push("created_date".to_string());

                    let mut patch = PatchFields::new();
                    let mut previous = PatchFields::new();
                    for key in &keys {
                        if let Some(value) = record.get(key) {
                            patch.insert(key.clone(), value.clone());
                            previous.insert(
                                key.clone(),
                                doc_json.get(key).cloned().unwrap_or(serde_json::Value::Null),
                            );
                        }
                    }
                    self.store.patch_document(document.id, &patch)?;
                    backups.push(BackupRecord {
                        id: document.id,
                        fields: previous,
                    });
                }
            }
        } else {
            info!(document = document.id, "no metadata changes");
        }

        if !self.skip_validation {
            if let Some(invalid_tag) = self.invalid_tag_id {
                self.validate_one(document.id, invalid_tag, env, backups, invalid)?;
            } else {
                debug!(document = document.id, "validation skipped, no invalid tag configured");
            }
        } else {
            debug!(document = document.id, "validation skipped");
        }
        Ok(())
    }

    /// Threads each matching rule's output into the next rule's input and
    /// returns the last matching rule's result.
    fn run_rules(&self, original: &Metadata, content: &str, env: &Environment<'_>) -> Metadata {
        let mut context = original.clone();
        let mut result = original.clone();
        for rule in self.ruleset.rules() {
            match rule.matches(&context, env) {
                Ok(true) => {
                    debug!(rule = rule.name(), "rule matches");
                    result = rule.apply(&context, content, self.store, env);
                    context = context.merged_with(&result);
                }
                Ok(false) => debug!(rule = rule.name(), "rule does not match"),
                Err(err) => warn!(
                    rule = rule.name(),
                    error = %err,
                    "match template failed, treating rule as non-matching"
                ),
            }
        }
        result
    }

    /// Re-fetches the document so validation sees the state just patched.
    fn validate_one(
        &self,
        document_id: u64,
        invalid_tag: u64,
        env: &Environment<'_>,
        backups: &mut Vec<BackupRecord>,
        invalid: &mut usize,
    ) -> Result<()> {
        let Some(fresh) = self.store.get_document(document_id)? else {
            warn!(document = document_id, "document disappeared before validation");
            return Ok(());
        };
        let metadata = working_metadata(&fresh, self.store)?;

        if self.is_valid(&metadata, env) {
            info!(document = document_id, "document is valid");
            return Ok(());
        }

        *invalid += 1;
        warn!(document = document_id, tag = invalid_tag, "document is invalid, tagging");
        if fresh.tags.contains(&invalid_tag) {
            return Ok(());
        }
        if !self.simulate {
            let mut tags = fresh.tags.clone();
            tags.push(invalid_tag);
            let mut patch = PatchFields::new();
            patch.insert("tags".to_string(), serde_json::json!(tags));
            self.store.patch_document(document_id, &patch)?;

            // The backup holds the tag list from before the invalid tag
            // was added, so a restore actually removes it.
            let mut fields = PatchFields::new();
            fields.insert("tags".to_string(), serde_json::json!(fresh.tags));
            backups.push(BackupRecord {
                id: document_id,
                fields,
            });
        }
        Ok(())
    }

    fn is_valid(&self, metadata: &Metadata, env: &Environment<'_>) -> bool {
        for rule in self.ruleset.rules() {
            match rule.matches(metadata, env) {
                Ok(true) => match rule.validate(metadata, env) {
                    Validation::Valid => {}
                    Validation::Invalid => return false,
                    Validation::Unvalidated(err) => {
                        warn!(
                            rule = rule.name(),
                            error = %err,
                            "validation template failed, counting as invalid"
                        );
                        return false;
                    }
                },
                Ok(false) => {}
                Err(err) => warn!(
                    rule = rule.name(),
                    error = %err,
                    "match template failed during validation"
                ),
            }
        }
        true
    }
}

fn resolve_tag(store: &dyn DocumentStore, name: Option<&str>) -> Result<Option<u64>> {
    let Some(name) = name else { return Ok(None) };
    let id = store.resolve_name(ItemKind::Tag, name)?;
    if id.is_none() {
        warn!(tag = name, "tag not found, feature disabled");
    }
    Ok(id)
}

/// Replays backup records, logging every field change. With `simulate`
/// nothing is patched.
pub fn restore(store: &dyn DocumentStore, records: &[BackupRecord], simulate: bool) -> Result<()> {
    info!(documents = records.len(), "restoring backup");
    for record in records {
        let current = match store.get_document(record.id)? {
            Some(document) => document_json(&document)?,
            None => {
                warn!(document = record.id, "document no longer exists, skipping");
                continue;
            }
        };
        info!(document = record.id, "restoring document");
        for (key, value) in &record.fields {
            info!(
                document = record.id,
                field = %key,
                old = %current.get(key).cloned().unwrap_or(serde_json::Value::Null),
                new = %value,
                "restore"
            );
        }
        if !simulate {
            store.patch_document(record.id, &record.fields)?;
        }
    }
    Ok(())
}
