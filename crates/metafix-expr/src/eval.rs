//! Expression evaluation against a metadata context.

use chrono::{Datelike, Local, NaiveDate, Timelike};
use metafix_model::{Metadata, Value};

use crate::error::{EvalError, EvalResult};
use crate::functions::call_function;
use crate::parser::{Arg, BinOp, Expr};

/// The collaborator-backed count query behind `num_documents(...)`.
///
/// The evaluator only needs this one capability from the document store, so
/// the store dependency stays behind a single-method trait.
pub trait DocumentCounts {
    fn count(&self, constraints: &[(String, Value)]) -> EvalResult<u64>;
}

/// A [`DocumentCounts`] that rejects every query. Useful for templates that
/// are known not to use `num_documents`, and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCounts;

impl DocumentCounts for NoCounts {
    fn count(&self, _constraints: &[(String, Value)]) -> EvalResult<u64> {
        Err(EvalError::Count(
            "no document store available for num_documents".to_string(),
        ))
    }
}

/// Evaluation environment: the count collaborator plus the notion of
/// "today" used by `expand_two_digit_year`'s default century.
pub struct Environment<'a> {
    counts: &'a dyn DocumentCounts,
    today: NaiveDate,
}

impl<'a> Environment<'a> {
    pub fn new(counts: &'a dyn DocumentCounts) -> Self {
        Self {
            counts,
            today: Local::now().date_naive(),
        }
    }

    /// Overrides the current date. Tests use this to pin the century.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.today
    }

    pub(crate) fn counts(&self) -> &dyn DocumentCounts {
        self.counts
    }
}

/// Evaluates an expression. Names absent from the context evaluate to the
/// empty string, so a typo in a rule yields a non-matching predicate
/// rather than a hard error.
pub fn eval(expr: &Expr, ctx: &Metadata, env: &Environment<'_>) -> EvalResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => Ok(ctx
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::Str(String::new()))),
        Expr::Attr { object, name } => {
            let object = eval(object, ctx, env)?;
            eval_attr(&object, name)
        }
        Expr::Call { function, args } => {
            let args = eval_args(args, ctx, env)?;
            call_function(function, &args, env)
        }
        Expr::Filter { input, name, args } => {
            let input = eval(input, ctx, env)?;
            let args = eval_args(args, ctx, env)?;
            crate::filters::apply_filter(name, &input, &args, env)
        }
        Expr::Not(inner) => {
            let inner = eval(inner, ctx, env)?;
            Ok(Value::Bool(!inner.truthy()))
        }
        Expr::Neg(inner) => {
            let inner = eval(inner, ctx, env)?;
            match inner {
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Delta(delta) => Ok(Value::Delta(-delta)),
                other => Err(EvalError::Type(format!(
                    "cannot negate {}",
                    type_name(&other)
                ))),
            }
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, ctx, env),
    }
}

pub(crate) type EvaluatedArg = (Option<String>, Value);

fn eval_args(args: &[Arg], ctx: &Metadata, env: &Environment<'_>) -> EvalResult<Vec<EvaluatedArg>> {
    args.iter()
        .map(|arg| Ok((arg.name.clone(), eval(&arg.value, ctx, env)?)))
        .collect()
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &Metadata,
    env: &Environment<'_>,
) -> EvalResult<Value> {
    // `and`/`or` short-circuit and yield the deciding operand.
    if op == BinOp::And {
        let lhs = eval(lhs, ctx, env)?;
        return if lhs.truthy() { eval(rhs, ctx, env) } else { Ok(lhs) };
    }
    if op == BinOp::Or {
        let lhs = eval(lhs, ctx, env)?;
        return if lhs.truthy() { Ok(lhs) } else { eval(rhs, ctx, env) };
    }

    let lhs = eval(lhs, ctx, env)?;
    let rhs = eval(rhs, ctx, env)?;
    match op {
        BinOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare(&lhs, &rhs)?;
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        BinOp::Add => add(&lhs, &rhs),
        BinOp::Sub => sub(&lhs, &rhs),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> EvalResult<std::cmp::Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Ok(a.cmp(b)),
        (Value::Delta(a), Value::Delta(b)) => Ok(a.cmp(b)),
        _ => Err(EvalError::Type(format!(
            "cannot order {} against {}",
            type_name(lhs),
            type_name(rhs)
        ))),
    }
}

fn add(lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::Date(d), Value::Delta(delta)) | (Value::Delta(delta), Value::Date(d)) => d
            .checked_add_signed(*delta)
            .map(Value::Date)
            .ok_or_else(|| EvalError::Date("date arithmetic out of range".to_string())),
        (Value::DateTime(dt), Value::Delta(delta)) | (Value::Delta(delta), Value::DateTime(dt)) => {
            dt.checked_add_signed(*delta)
                .map(Value::DateTime)
                .ok_or_else(|| EvalError::Date("datetime arithmetic out of range".to_string()))
        }
        (Value::Delta(a), Value::Delta(b)) => Ok(Value::Delta(*a + *b)),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Ok(Value::List(items))
        }
        _ => Err(EvalError::Type(format!(
            "cannot add {} and {}",
            type_name(lhs),
            type_name(rhs)
        ))),
    }
}

fn sub(lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
        (Value::Date(d), Value::Delta(delta)) => d
            .checked_sub_signed(*delta)
            .map(Value::Date)
            .ok_or_else(|| EvalError::Date("date arithmetic out of range".to_string())),
        (Value::Date(a), Value::Date(b)) => Ok(Value::Delta(a.signed_duration_since(*b))),
        (Value::DateTime(dt), Value::Delta(delta)) => dt
            .checked_sub_signed(*delta)
            .map(Value::DateTime)
            .ok_or_else(|| EvalError::Date("datetime arithmetic out of range".to_string())),
        (Value::DateTime(a), Value::DateTime(b)) => {
            Ok(Value::Delta(a.signed_duration_since(*b)))
        }
        (Value::Delta(a), Value::Delta(b)) => Ok(Value::Delta(*a - *b)),
        _ => Err(EvalError::Type(format!(
            "cannot subtract {} from {}",
            type_name(rhs),
            type_name(lhs)
        ))),
    }
}

fn eval_attr(object: &Value, name: &str) -> EvalResult<Value> {
    match (object, name) {
        (Value::Date(d), "year") => Ok(Value::Int(i64::from(d.year()))),
        (Value::Date(d), "month") => Ok(Value::Int(i64::from(d.month()))),
        (Value::Date(d), "day") => Ok(Value::Int(i64::from(d.day()))),
        (Value::DateTime(dt), "year") => Ok(Value::Int(i64::from(dt.year()))),
        (Value::DateTime(dt), "month") => Ok(Value::Int(i64::from(dt.month()))),
        (Value::DateTime(dt), "day") => Ok(Value::Int(i64::from(dt.day()))),
        (Value::DateTime(dt), "hour") => Ok(Value::Int(i64::from(dt.hour()))),
        (Value::DateTime(dt), "minute") => Ok(Value::Int(i64::from(dt.minute()))),
        (Value::Map(entries), key) => Ok(entries.get(key).cloned().unwrap_or(Value::None)),
        _ => Err(EvalError::Type(format!(
            "{} has no attribute '{name}'",
            type_name(object)
        ))),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::None => "none",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Str(_) => "string",
        Value::Date(_) => "date",
        Value::DateTime(_) => "datetime",
        Value::Delta(_) => "timedelta",
        Value::List(_) => "list",
        Value::Map(_) => "map",
    }
}
