//! Orchestrator tests over the in-memory store.

use metafix_engine::{Options, Postprocessor, restore};
use metafix_model::{BackupRecord, CustomFieldDef, CustomFieldEntry, Document, ItemKind, PatchFields};
use metafix_rules::{Rule, Ruleset};
use metafix_store::MemoryStore;

fn rule(yaml: &str) -> Rule {
    let doc: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
    Rule::from_yaml(&doc).unwrap()
}

fn ruleset(yamls: &[&str]) -> Ruleset {
    Ruleset::from_rules(yamls.iter().map(|yaml| rule(yaml)).collect())
}

fn document() -> Document {
    Document {
        id: 1,
        correspondent: Some(3),
        tags: vec![1],
        title: "scan_0001".to_string(),
        created: "2020-05-15T10:00:00+00:00".to_string(),
        created_date: "2020-05-15".to_string(),
        added: "2020-05-16T09:00:00+00:00".to_string(),
        content: "Statement from 2019-03-07".to_string(),
        ..Document::default()
    }
}

fn store() -> MemoryStore {
    MemoryStore::new()
        .with_item(ItemKind::Correspondent, 3, "The Bank")
        .with_item(ItemKind::Tag, 1, "inbox")
        .with_item(ItemKind::Tag, 7, "processed")
        .with_item(ItemKind::Tag, 8, "invalid")
        .with_document(document())
}

fn process(store: &MemoryStore, ruleset: &Ruleset, options: &Options) -> Vec<BackupRecord> {
    let documents = vec![store.document(1).unwrap()];
    let processor = Postprocessor::new(store, ruleset, options).unwrap();
    processor.process(&documents).unwrap()
}

#[test]
fn later_rules_see_earlier_rules_output() {
    let rules = ruleset(&[
        "{First: {match: true, metadata_postprocessing: {title: 'base'}}}",
        "{Second: {match: \"{{ title == 'base' }}\", metadata_postprocessing: {title: '{{ title }} extended'}}}",
    ]);
    let store = store();
    process(&store, &rules, &Options::default());
    assert_eq!(store.document(1).unwrap().title, "base extended");
}

#[test]
fn rewriting_a_field_to_its_current_value_is_not_a_change() {
    let rules = ruleset(&[
        "{Same: {match: true, metadata_postprocessing: {title: 'scan_0001', asn: '999'}}}",
    ]);
    let store = store();
    let backups = process(&store, &rules, &Options::default());

    assert_eq!(store.patches().len(), 1);
    let (_, patch) = &store.patches()[0];
    assert!(!patch.contains_key("title"));
    assert_eq!(patch.get("archive_serial_number"), Some(&serde_json::json!(999)));
    // The backup mirrors the patch keys with the pre-change values.
    assert_eq!(backups.len(), 1);
    assert_eq!(
        backups[0].fields.get("archive_serial_number"),
        Some(&serde_json::Value::Null)
    );
    assert!(!backups[0].fields.contains_key("title"));
}

#[test]
fn created_date_always_rides_along_with_a_patch() {
    let rules = ruleset(&[
        "{Rename: {match: true, metadata_postprocessing: {title: 'renamed'}}}",
    ]);
    let store = store();
    let backups = process(&store, &rules, &Options::default());

    let (_, patch) = &store.patches()[0];
    assert_eq!(patch.get("created_date"), Some(&serde_json::json!("2020-05-15")));
    assert_eq!(backups[0].fields.get("created_date"), Some(&serde_json::json!("2020-05-15")));
    assert_eq!(backups[0].id, 1);
    assert_eq!(backups[0].fields.get("title"), Some(&serde_json::json!("scan_0001")));
}

#[test]
fn postprocessing_tag_is_appended_exactly_once() {
    let rules = ruleset(&[
        "{Rename: {match: true, metadata_postprocessing: {title: 'renamed'}}}",
    ]);
    let options = Options {
        postprocessing_tag: Some("processed".to_string()),
        ..Options::default()
    };

    let store = store();
    process(&store, &rules, &options);
    assert_eq!(store.document(1).unwrap().tags, vec![1, 7]);

    // A document already carrying the tag gets no tag change at all.
    let mut tagged = document();
    tagged.tags = vec![1, 7];
    let store = MemoryStore::new()
        .with_item(ItemKind::Correspondent, 3, "The Bank")
        .with_item(ItemKind::Tag, 1, "inbox")
        .with_item(ItemKind::Tag, 7, "processed")
        .with_document(tagged);
    process(&store, &rules, &options);
    let (_, patch) = &store.patches()[0];
    assert!(!patch.contains_key("tags"));
    assert_eq!(store.document(1).unwrap().tags, vec![1, 7]);
}

#[test]
fn simulation_never_patches_and_emits_no_backups() {
    let rules = ruleset(&[
        "{Rename: {match: true, metadata_postprocessing: {title: 'renamed'}}}",
    ]);
    let options = Options {
        simulate: true,
        ..Options::default()
    };
    let store = store();
    let backups = process(&store, &rules, &options);
    assert!(backups.is_empty());
    assert!(store.patches().is_empty());
    assert_eq!(store.document(1).unwrap().title, "scan_0001");
}

#[test]
fn second_run_after_a_patch_changes_nothing() {
    let rules = ruleset(&[
        r#"
Extract:
  match: true
  metadata_regex: '(?P<created_year>\d{4})-(?P<created_month>\d{2})-(?P<created_day>\d{2})'
"#,
    ]);
    let store = store();
    process(&store, &rules, &Options::default());
    assert_eq!(store.document(1).unwrap().created_date, "2019-03-07");
    let patches_after_first = store.patches().len();

    let backups = process(&store, &rules, &Options::default());
    assert!(backups.is_empty());
    assert_eq!(store.patches().len(), patches_after_first);
}

#[test]
fn custom_field_edits_are_patched_and_isolated() {
    let rules = ruleset(&[
        r#"
Invoices:
  match: true
  metadata_postprocessing:
    custom_fields:
      Invoice Number: 'INV-{{ created_year }}'
"#,
    ]);
    let mut doc = document();
    doc.custom_fields = vec![
        CustomFieldEntry { field: 4, value: serde_json::json!("old") },
        CustomFieldEntry { field: 9, value: serde_json::json!("keep") },
    ];
    let store = MemoryStore::new()
        .with_item(ItemKind::Correspondent, 3, "The Bank")
        .with_item(ItemKind::Tag, 1, "inbox")
        .with_custom_field(CustomFieldDef {
            id: 4,
            name: "Invoice Number".to_string(),
            data_type: None,
        })
        .with_document(doc);
    process(&store, &rules, &Options::default());

    let updated = store.document(1).unwrap();
    assert_eq!(updated.custom_fields[0].value, serde_json::json!("INV-2020"));
    assert_eq!(updated.custom_fields[1].value, serde_json::json!("keep"));
}

#[test]
fn invalid_documents_are_tagged_with_a_pre_change_backup() {
    let rules = ruleset(&[
        "{Strict: {match: true, validation_rule: \"{{ title == 'expected' }}\"}}",
    ]);
    let options = Options {
        invalid_tag: Some("invalid".to_string()),
        ..Options::default()
    };
    let store = store();
    let backups = process(&store, &rules, &options);

    assert_eq!(store.document(1).unwrap().tags, vec![1, 8]);
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].fields.get("tags"), Some(&serde_json::json!([1])));
}

#[test]
fn skipping_validation_suppresses_invalid_tagging() {
    let rules = ruleset(&[
        "{Strict: {match: true, validation_rule: 'False'}}",
    ]);
    let options = Options {
        invalid_tag: Some("invalid".to_string()),
        skip_validation: true,
        ..Options::default()
    };
    let store = store();
    let backups = process(&store, &rules, &options);
    assert!(backups.is_empty());
    assert!(store.patches().is_empty());
}

#[test]
fn restore_replays_backup_fields() {
    let store = store();
    let mut fields = PatchFields::new();
    fields.insert("title".to_string(), serde_json::json!("the old title"));
    let records = vec![BackupRecord { id: 1, fields }];

    restore(&store, &records, true).unwrap();
    assert_eq!(store.document(1).unwrap().title, "scan_0001");

    restore(&store, &records, false).unwrap();
    assert_eq!(store.document(1).unwrap().title, "the old title");
}
