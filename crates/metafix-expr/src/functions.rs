//! Global functions available inside template expressions.

use chrono::{Datelike, NaiveDate, TimeDelta};
use metafix_model::Value;

use crate::error::{EvalError, EvalResult};
use crate::eval::{Environment, EvaluatedArg, type_name};

pub(crate) fn call_function(
    name: &str,
    args: &[EvaluatedArg],
    env: &Environment<'_>,
) -> EvalResult<Value> {
    match name {
        "date" => date(args),
        "timedelta" => timedelta(args),
        "last_date_object_of_month" => last_date_object_of_month(args),
        "num_documents" => num_documents(args, env),
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

/// `date(year, month, day)`: a calendar date.
fn date(args: &[EvaluatedArg]) -> EvalResult<Value> {
    let positional = positional_only(args, "date")?;
    let [year, month, day] = positional.as_slice() else {
        return Err(EvalError::Argument(
            "date() takes exactly three arguments".to_string(),
        ));
    };
    let year = int_arg(year, "date() year")?;
    let month = int_arg(month, "date() month")?;
    let day = int_arg(day, "date() day")?;
    let year = i32::try_from(year)
        .map_err(|_| EvalError::Date(format!("year {year} out of range")))?;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .map(Value::Date)
        .ok_or_else(|| EvalError::Date(format!("invalid date {year}-{month}-{day}")))
}

/// `timedelta(days=…, weeks=…, hours=…, minutes=…, seconds=…)`; a single
/// positional argument counts as days.
fn timedelta(args: &[EvaluatedArg]) -> EvalResult<Value> {
    let mut delta = TimeDelta::zero();
    let mut saw_positional = false;
    for (name, value) in args {
        let amount = int_arg(value, "timedelta() argument")?;
        match name.as_deref() {
            None if !saw_positional => {
                saw_positional = true;
                delta += TimeDelta::days(amount);
            }
            None => {
                return Err(EvalError::Argument(
                    "timedelta() takes at most one positional argument".to_string(),
                ));
            }
            Some("days") => delta += TimeDelta::days(amount),
            Some("weeks") => delta += TimeDelta::weeks(amount),
            Some("hours") => delta += TimeDelta::hours(amount),
            Some("minutes") => delta += TimeDelta::minutes(amount),
            Some("seconds") => delta += TimeDelta::seconds(amount),
            Some(other) => {
                return Err(EvalError::Argument(format!(
                    "timedelta() got an unexpected keyword '{other}'"
                )));
            }
        }
    }
    Ok(Value::Delta(delta))
}

/// `last_date_object_of_month(date)`: the last calendar day of that
/// date's month. Non-date input yields `None` rather than an error.
fn last_date_object_of_month(args: &[EvaluatedArg]) -> EvalResult<Value> {
    let positional = positional_only(args, "last_date_object_of_month")?;
    let [value] = positional.as_slice() else {
        return Err(EvalError::Argument(
            "last_date_object_of_month() takes exactly one argument".to_string(),
        ));
    };
    let Some(date) = value.as_date() else {
        return Ok(Value::None);
    };
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| EvalError::Date("month arithmetic out of range".to_string()))?;
    Ok(Value::Date(first_of_next - TimeDelta::days(1)))
}

/// `num_documents(**constraints)`: delegates to the document store's
/// filtered count. Constraint names use the selector-field vocabulary
/// (`correspondent`, `created_year`, `added_range`, …).
fn num_documents(args: &[EvaluatedArg], env: &Environment<'_>) -> EvalResult<Value> {
    let mut constraints = Vec::with_capacity(args.len());
    for (name, value) in args {
        let Some(name) = name else {
            return Err(EvalError::Argument(
                "num_documents() accepts keyword arguments only".to_string(),
            ));
        };
        constraints.push((name.clone(), value.clone()));
    }
    let count = env.counts().count(&constraints)?;
    let count = i64::try_from(count)
        .map_err(|_| EvalError::Count("document count out of range".to_string()))?;
    Ok(Value::Int(count))
}

fn positional_only<'v>(
    args: &'v [EvaluatedArg],
    function: &str,
) -> EvalResult<Vec<&'v Value>> {
    args.iter()
        .map(|(name, value)| match name {
            None => Ok(value),
            Some(keyword) => Err(EvalError::Argument(format!(
                "{function}() got an unexpected keyword '{keyword}'"
            ))),
        })
        .collect()
}

fn int_arg(value: &Value, what: &str) -> EvalResult<i64> {
    value
        .as_int()
        .ok_or_else(|| EvalError::Argument(format!("{what} must be an integer, got {}", type_name(value))))
}
