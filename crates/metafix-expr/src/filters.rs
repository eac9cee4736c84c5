//! Filters available in template pipelines (`value | filter(args…)`).

use metafix_model::Value;
use regex::Regex;

use chrono::Datelike;

use crate::error::{EvalError, EvalResult};
use crate::eval::{Environment, EvaluatedArg};

pub(crate) fn apply_filter(
    name: &str,
    input: &Value,
    args: &[EvaluatedArg],
    env: &Environment<'_>,
) -> EvalResult<Value> {
    match name {
        "expand_two_digit_year" => expand_two_digit_year(input, args, env),
        "regex_match" => regex_match(input, args),
        "regex_sub" => regex_sub(input, args),
        other => Err(EvalError::UnknownFilter(other.to_string())),
    }
}

/// `year | expand_two_digit_year(prefix=None)`: prefixes a two-digit year
/// with a century. Without a prefix the current century is used; an integer
/// prefix is the century number (`19` → `1907`). Years of 100 and above
/// pass through unchanged.
fn expand_two_digit_year(
    input: &Value,
    args: &[EvaluatedArg],
    env: &Environment<'_>,
) -> EvalResult<Value> {
    let year = input.as_int().ok_or_else(|| {
        EvalError::Argument(format!(
            "expand_two_digit_year expects a year, got '{}'",
            input.render()
        ))
    })?;
    if year >= 100 {
        return Ok(Value::Str(input.render()));
    }

    let prefix = match args {
        [] => (env.today().year() / 100).to_string(),
        [(None, value)] | [(Some(_), value)] => match value {
            Value::None => (env.today().year() / 100).to_string(),
            Value::Int(century) => century.to_string(),
            Value::Str(prefix) => prefix.clone(),
            other => {
                return Err(EvalError::Argument(format!(
                    "expand_two_digit_year prefix must be an integer or string, got '{}'",
                    other.render()
                )));
            }
        },
        _ => {
            return Err(EvalError::Argument(
                "expand_two_digit_year takes at most one prefix argument".to_string(),
            ));
        }
    };
    Ok(Value::Str(format!("{prefix}{year:02}")))
}

/// `string | regex_match(pattern)`: true when the pattern matches at the
/// start of the string.
fn regex_match(input: &Value, args: &[EvaluatedArg]) -> EvalResult<Value> {
    let [(None, pattern)] = args else {
        return Err(EvalError::Argument(
            "regex_match takes exactly one pattern argument".to_string(),
        ));
    };
    let pattern = str_arg(pattern, "regex_match pattern")?;
    let anchored = compile(&format!("^(?:{pattern})"), pattern)?;
    Ok(Value::Bool(anchored.is_match(&input.render())))
}

/// `string | regex_sub(pattern, replacement)`: replaces every match.
/// Capture groups are referenced `$1`/`$name` style in the replacement.
fn regex_sub(input: &Value, args: &[EvaluatedArg]) -> EvalResult<Value> {
    let [(None, pattern), (None, replacement)] = args else {
        return Err(EvalError::Argument(
            "regex_sub takes a pattern and a replacement".to_string(),
        ));
    };
    let pattern = str_arg(pattern, "regex_sub pattern")?;
    let replacement = str_arg(replacement, "regex_sub replacement")?;
    let compiled = compile(pattern, pattern)?;
    Ok(Value::Str(
        compiled.replace_all(&input.render(), replacement).into_owned(),
    ))
}

fn compile(expanded: &str, original: &str) -> EvalResult<Regex> {
    Regex::new(expanded).map_err(|error| EvalError::Regex {
        pattern: original.to_string(),
        message: error.to_string(),
    })
}

fn str_arg<'v>(value: &'v Value, what: &str) -> EvalResult<&'v str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::Argument(format!(
            "{what} must be a string, got '{}'",
            other.render()
        ))),
    }
}
