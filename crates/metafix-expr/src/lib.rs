//! Template expression language for metadata transformation rules.
//!
//! Rule files embed small templates (`{{ … }}`) that are rendered against a
//! document's working metadata: match predicates, per-field rewrites and
//! validation rules. This crate compiles those templates once and evaluates
//! them with a fixed library of filters (`expand_two_digit_year`,
//! `regex_match`, `regex_sub`) and globals (`date`, `timedelta`,
//! `last_date_object_of_month`, `num_documents`).

mod error;
mod eval;
mod filters;
mod functions;
mod lexer;
mod parser;
mod template;

pub use error::{EvalError, EvalResult, TemplateError};
pub use eval::{DocumentCounts, Environment, NoCounts};
pub use template::Template;
