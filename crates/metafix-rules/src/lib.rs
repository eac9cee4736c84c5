//! Rule definitions: loading, matching, extraction, field transforms and
//! validation, plus the creation-date normalizer they all share.

mod loader;
mod normalize;
mod rule;

pub use loader::Ruleset;
pub use normalize::normalize_created;
pub use rule::{FieldTransform, MatchSpec, Rule, RuleError, RuleParseError, Validation};
