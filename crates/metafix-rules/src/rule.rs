//! A single metadata transformation rule.
//!
//! A rule is matched against a document's working metadata, optionally
//! extracts fields from the document content with a named-group pattern,
//! rewrites fields through templates, and can veto the final state with a
//! validation predicate.

use metafix_expr::{Environment, EvalError, EvalResult, Template, TemplateError};
use metafix_model::{Metadata, Value, fields};
use metafix_store::DocumentStore;
use regex::Regex;
use serde_yaml::Value as Yaml;
use thiserror::Error;
use tracing::{debug, warn};

use crate::normalize::normalize_created;

/// Why a rule definition was rejected at load time.
#[derive(Debug, Error)]
pub enum RuleParseError {
    #[error("rule document must map exactly one rule name to a mapping body")]
    Shape,
    #[error("invalid template for '{field}': {source}")]
    Template {
        field: String,
        source: TemplateError,
    },
    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Why one field transform was abandoned at apply time. Other transforms of
/// the same rule keep running.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Render(#[from] EvalError),
    #[error("store error: {0}")]
    Store(String),
    #[error("unknown custom field '{0}'")]
    UnknownCustomField(String),
}

/// The `match` entry of a rule definition.
#[derive(Debug, Clone)]
pub enum MatchSpec {
    Literal(bool),
    Template(Template),
}

/// One entry of `metadata_postprocessing`, in definition order.
#[derive(Debug, Clone)]
pub enum FieldTransform {
    /// Rewrites a plain metadata field.
    Direct { field: String, template: Template },
    /// Rewrites the value of one custom-field slot, located by resolving
    /// the field name to its definition id.
    CustomField { name: String, template: Template },
}

impl FieldTransform {
    /// The field name for log messages.
    pub fn target(&self) -> &str {
        match self {
            FieldTransform::Direct { field, .. } => field,
            FieldTransform::CustomField { name, .. } => name,
        }
    }
}

/// Outcome of a validation pass.
#[derive(Debug)]
pub enum Validation {
    Valid,
    Invalid,
    /// The predicate itself failed to render; counted as not valid but
    /// logged as a configuration problem rather than a rejection.
    Unvalidated(EvalError),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    match_spec: MatchSpec,
    extraction: Option<Regex>,
    transforms: Vec<FieldTransform>,
    validation: Option<Template>,
}

impl Rule {
    /// Builds a rule from one YAML document of the form
    /// `{name: {match, metadata_regex, metadata_postprocessing,
    /// validation_rule}}`. All templates and the extraction pattern are
    /// compiled here so configuration errors surface at load time.
    pub fn from_yaml(doc: &Yaml) -> Result<Rule, RuleParseError> {
        let Yaml::Mapping(map) = doc else {
            return Err(RuleParseError::Shape);
        };
        let mut entries = map.iter();
        let Some((Yaml::String(name), body)) = entries.next() else {
            return Err(RuleParseError::Shape);
        };
        if entries.next().is_some() || !matches!(body, Yaml::Mapping(_)) {
            return Err(RuleParseError::Shape);
        }

        let match_spec = match body.get("match") {
            Some(Yaml::Bool(literal)) => MatchSpec::Literal(*literal),
            Some(Yaml::String(source)) => MatchSpec::Template(compile(source, "match")?),
            // Any other shape, including an absent entry, never matches.
            _ => MatchSpec::Literal(false),
        };

        let extraction = match body.get("metadata_regex") {
            Some(Yaml::String(pattern)) => Some(Regex::new(pattern)?),
            _ => None,
        };

        let mut transforms = Vec::new();
        if let Some(Yaml::Mapping(postprocessing)) = body.get("metadata_postprocessing") {
            for (key, value) in postprocessing {
                let Yaml::String(field) = key else {
                    return Err(RuleParseError::Shape);
                };
                if field == fields::CUSTOM_FIELDS {
                    let Yaml::Mapping(nested) = value else {
                        return Err(RuleParseError::Shape);
                    };
                    for (cf_name, cf_template) in nested {
                        let (Yaml::String(cf_name), Yaml::String(source)) = (cf_name, cf_template)
                        else {
                            return Err(RuleParseError::Shape);
                        };
                        transforms.push(FieldTransform::CustomField {
                            name: cf_name.clone(),
                            template: compile(source, cf_name)?,
                        });
                    }
                } else {
                    let Yaml::String(source) = value else {
                        return Err(RuleParseError::Shape);
                    };
                    transforms.push(FieldTransform::Direct {
                        field: field.clone(),
                        template: compile(source, field)?,
                    });
                }
            }
        }

        let validation = match body.get("validation_rule") {
            Some(Yaml::String(source)) => Some(compile(source, "validation_rule")?),
            _ => None,
        };

        Ok(Rule {
            name: name.clone(),
            match_spec,
            extraction,
            transforms,
            validation,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the rule applies to this metadata. Template render errors
    /// propagate; the caller decides whether that disables the rule.
    pub fn matches(&self, metadata: &Metadata, env: &Environment<'_>) -> EvalResult<bool> {
        match &self.match_spec {
            MatchSpec::Literal(literal) => Ok(*literal),
            MatchSpec::Template(template) => template.render_is_true(metadata, env),
        }
    }

    /// Runs extraction and all field transforms, returning the new working
    /// metadata. A failing transform is logged and skipped; the fields it
    /// would have written keep their previous value.
    pub fn apply(
        &self,
        metadata: &Metadata,
        content: &str,
        store: &dyn DocumentStore,
        env: &Environment<'_>,
    ) -> Metadata {
        let (mut writable, read_only) = metadata.split_read_only();

        if let Some(pattern) = &self.extraction {
            if let Some(captures) = pattern.captures(content) {
                for group in pattern.capture_names().flatten() {
                    if let Some(found) = captures.name(group) {
                        writable.set(group, Value::from(found.as_str()));
                    }
                }
                writable = normalize_created(&writable, metadata);
                debug!(rule = self.name, "extraction pattern matched");
            } else {
                warn!(
                    rule = self.name,
                    pattern = pattern.as_str(),
                    "extraction pattern did not match document content"
                );
            }
        }

        for transform in &self.transforms {
            let merged = writable.merged_with(&read_only);
            match self.apply_transform(transform, &merged, &mut writable, store, env) {
                Ok(()) => writable = normalize_created(&writable, metadata),
                Err(err) => warn!(
                    rule = self.name,
                    field = transform.target(),
                    error = %err,
                    "transform failed, keeping previous value"
                ),
            }
        }

        writable.merged_with(&read_only)
    }

    fn apply_transform(
        &self,
        transform: &FieldTransform,
        merged: &Metadata,
        writable: &mut Metadata,
        store: &dyn DocumentStore,
        env: &Environment<'_>,
    ) -> Result<(), RuleError> {
        match transform {
            FieldTransform::Direct { field, template } => {
                let rendered = template.render(merged, env)?;
                debug!(
                    rule = self.name,
                    field,
                    old = merged.rendered(field),
                    new = rendered,
                    "field rewritten"
                );
                writable.set(field.clone(), Value::from(rendered));
                Ok(())
            }
            FieldTransform::CustomField { name, template } => {
                let def = store
                    .resolve_custom_field(name)
                    .map_err(|err| RuleError::Store(err.to_string()))?
                    .ok_or_else(|| RuleError::UnknownCustomField(name.clone()))?;
                let rendered = template.render(merged, env)?;

                let mut slots = match writable.get(fields::CUSTOM_FIELDS) {
                    Some(Value::List(slots)) => slots.clone(),
                    _ => return Ok(()),
                };
                let mut touched = false;
                for slot in &mut slots {
                    if let Value::Map(entry) = slot {
                        if entry.get("field").and_then(Value::as_int)
                            == i64::try_from(def.id).ok()
                        {
                            entry.insert("value".to_string(), Value::from(rendered.clone()));
                            touched = true;
                        }
                    }
                }
                if touched {
                    writable.set(fields::CUSTOM_FIELDS, Value::List(slots));
                } else {
                    debug!(
                        rule = self.name,
                        custom_field = name,
                        "document has no slot for this custom field"
                    );
                }
                Ok(())
            }
        }
    }

    /// Evaluates the validation predicate against renormalized metadata.
    pub fn validate(&self, metadata: &Metadata, env: &Environment<'_>) -> Validation {
        let metadata = normalize_created(metadata, metadata);
        let Some(template) = &self.validation else {
            return Validation::Valid;
        };
        match template.render_is_not_false(&metadata, env) {
            Ok(true) => Validation::Valid,
            Ok(false) => {
                warn!(
                    rule = self.name,
                    template = template.source(),
                    "validation rule failed"
                );
                Validation::Invalid
            }
            Err(err) => Validation::Unvalidated(err),
        }
    }
}

fn compile(source: &str, field: &str) -> Result<Template, RuleParseError> {
    Template::parse(source).map_err(|source| RuleParseError::Template {
        field: field.to_string(),
        source,
    })
}
