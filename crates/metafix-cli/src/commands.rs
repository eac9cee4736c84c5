//! Subcommand implementations.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, info_span, warn};

use metafix_engine::{Options, Postprocessor, restore};
use metafix_model::{ItemKind, read_backup, write_backup};
use metafix_rules::Ruleset;
use metafix_store::{DocumentSelector, DocumentStore, HttpStore};

use crate::cli::{ProcessArgs, RestoreArgs, SelectorArg};

pub fn run_process(args: &ProcessArgs) -> Result<()> {
    let selector = selector_from_args(args)?;
    let store = HttpStore::new(&args.url, &args.token).context("create store client")?;
    let ruleset = Ruleset::load(&args.rules_dir)
        .with_context(|| format!("load rules from {}", args.rules_dir.display()))?;
    if ruleset.is_empty() {
        warn!(dir = %args.rules_dir.display(), "no rules loaded");
    }
    if args.dry_run {
        info!("doing a dry run, no changes will be made");
    }

    let documents = store.list_documents(&selector).context("list documents")?;
    if documents.is_empty() {
        warn!("no documents matched the selector");
        return Ok(());
    }
    info!(documents = documents.len(), "postprocessing");

    let options = Options {
        postprocessing_tag: args.postprocessing_tag.clone(),
        invalid_tag: args.invalid_tag.clone(),
        simulate: args.dry_run,
        skip_validation: args.skip_validation,
    };
    let run_span = info_span!("process", documents = documents.len());
    let _run_guard = run_span.enter();
    let processor = Postprocessor::new(&store, &ruleset, &options)?;
    let backups = processor.process(&documents)?;

    if let Some(path) = &args.backup {
        if backups.is_empty() {
            info!("nothing changed, no backup written");
        } else {
            let path = resolve_backup_path(path);
            let file = File::create(&path)
                .with_context(|| format!("create backup file {}", path.display()))?;
            write_backup(file, &backups)?;
            info!(path = %path.display(), records = backups.len(), "backup written");
        }
    }
    Ok(())
}

pub fn run_restore(args: &RestoreArgs) -> Result<()> {
    let store = HttpStore::new(&args.url, &args.token).context("create store client")?;
    let file = File::open(&args.file)
        .with_context(|| format!("open backup file {}", args.file.display()))?;
    let records = read_backup(BufReader::new(file)).context("parse backup file")?;
    if args.dry_run {
        info!("doing a dry run, no changes will be made");
    }
    restore(&store, &records, args.dry_run)?;
    Ok(())
}

fn selector_from_args(args: &ProcessArgs) -> Result<DocumentSelector> {
    let named = |kind: ItemKind| -> Result<DocumentSelector> {
        let name = args.name_or_id.clone().with_context(|| {
            format!("a {kind} name is required with this selector, but none was given")
        })?;
        Ok(DocumentSelector::ByItem { kind, name })
    };
    match args.selector {
        SelectorArg::All => Ok(DocumentSelector::All),
        SelectorArg::DocumentId => {
            let raw = args
                .name_or_id
                .as_deref()
                .context("a document id is required with this selector, but none was given")?;
            let id = raw
                .parse()
                .with_context(|| format!("invalid document id '{raw}'"))?;
            Ok(DocumentSelector::ById(id))
        }
        SelectorArg::Correspondent => named(ItemKind::Correspondent),
        SelectorArg::DocumentType => named(ItemKind::DocumentType),
        SelectorArg::Tag => named(ItemKind::Tag),
        SelectorArg::StoragePath => named(ItemKind::StoragePath),
    }
}

/// An empty path means "auto-name in the working directory"; a directory
/// gets the auto-named file placed inside it.
fn resolve_backup_path(path: &Path) -> PathBuf {
    let default_name = format!("{}.backup", Local::now().format("%Y-%m-%d--%H-%M-%S"));
    if path.as_os_str().is_empty() {
        PathBuf::from(default_name)
    } else if path.is_dir() {
        path.join(default_name)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_backup_path_generates_a_timestamped_name() {
        let resolved = resolve_backup_path(Path::new(""));
        let name = resolved.to_string_lossy();
        assert!(name.ends_with(".backup"));
        assert!(name.len() > ".backup".len());
    }

    #[test]
    fn directory_backup_path_gets_a_file_inside() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_backup_path(dir.path());
        assert_eq!(resolved.parent(), Some(dir.path()));
        assert!(resolved.to_string_lossy().ends_with(".backup"));
    }

    #[test]
    fn explicit_backup_path_is_kept() {
        let resolved = resolve_backup_path(Path::new("my-run.backup"));
        assert_eq!(resolved, PathBuf::from("my-run.backup"));
    }
}
