//! Ruleset loading from a directory of YAML files.

use std::fs;
use std::path::{Path, PathBuf};

use metafix_model::Result;
use serde::Deserialize;
use serde_yaml::Value as Yaml;
use tracing::{debug, info, warn};

use crate::rule::Rule;

/// The ordered collection of loaded rules. Order is load order: files in
/// lexicographic name order, documents in file order. It is significant,
/// later rules see earlier rules' output.
#[derive(Debug, Default)]
pub struct Ruleset {
    rules: Vec<Rule>,
}

impl Ruleset {
    /// Loads every `*.yml` / `*.yaml` file under `dir`.
    ///
    /// Bad input is isolated at two levels: a file that is not valid YAML
    /// is skipped whole, and a YAML document that is not a valid rule (or
    /// whose templates fail to compile) is skipped on its own. Both log a
    /// warning and loading continues. A rule name seen twice keeps its
    /// first definition.
    pub fn load(dir: &Path) -> Result<Ruleset> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|ext| ext.to_str()),
                        Some("yml" | "yaml")
                    )
            })
            .collect();
        paths.sort();

        let mut rules: Vec<Rule> = Vec::new();
        for path in paths {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unable to read rule file");
                    continue;
                }
            };
            let docs = match parse_documents(&text) {
                Ok(docs) => docs,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unable to parse rule file");
                    continue;
                }
            };
            for doc in docs {
                match Rule::from_yaml(&doc) {
                    Ok(rule) => {
                        if rules.iter().any(|seen| seen.name() == rule.name()) {
                            warn!(
                                rule = rule.name(),
                                path = %path.display(),
                                "duplicate rule name, keeping the first definition"
                            );
                        } else {
                            debug!(rule = rule.name(), path = %path.display(), "loaded rule");
                            rules.push(rule);
                        }
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping rule");
                    }
                }
            }
        }
        info!(rules = rules.len(), "ruleset loaded");
        Ok(Ruleset { rules })
    }

    /// Builds a ruleset from already-constructed rules, keeping their order.
    pub fn from_rules(rules: Vec<Rule>) -> Ruleset {
        Ruleset { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Splits a multi-document YAML stream. Empty documents are dropped.
fn parse_documents(text: &str) -> serde_yaml::Result<Vec<Yaml>> {
    let mut docs = Vec::new();
    for de in serde_yaml::Deserializer::from_str(text) {
        let doc = Yaml::deserialize(de)?;
        if !matches!(doc, Yaml::Null) {
            docs.push(doc);
        }
    }
    Ok(docs)
}
