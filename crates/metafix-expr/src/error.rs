use thiserror::Error;

/// Errors raised while compiling a template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("unclosed '{{{{' expression delimiter")]
    UnclosedDelimiter,
    #[error("empty expression")]
    EmptyExpression,
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedCharacter { ch: char, offset: usize },
    #[error("unterminated string literal at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("integer literal out of range at offset {offset}")]
    IntegerOverflow { offset: usize },
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },
}

/// Errors raised while evaluating a compiled template against a context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
    #[error("invalid regex '{pattern}': {message}")]
    Regex { pattern: String, message: String },
    #[error("type error: {0}")]
    Type(String),
    #[error("invalid argument: {0}")]
    Argument(String),
    #[error("invalid date: {0}")]
    Date(String),
    #[error("document count query failed: {0}")]
    Count(String),
}

pub type EvalResult<T> = std::result::Result<T, EvalError>;
