//! The value type shared by the working metadata record and the template
//! language.
//!
//! Values carry the handful of shapes document metadata can take: strings,
//! integers, booleans, dates with and without a time component, time deltas,
//! lists (tag names, custom-field entries) and maps (one custom-field entry).
//! Rendering follows the conventions the rule templates rely on: booleans
//! render as `True`/`False` and dates as `YYYY-MM-DD`, so a match predicate
//! can be compared against the literal string `"True"`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Delta(TimeDelta),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Renders the value the way it appears in template output.
    pub fn render(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.to_rfc3339(),
            Value::Delta(delta) => render_delta(*delta),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("'{}': {}", k, v.repr()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// Like [`Value::render`], but quotes strings. Used for container items.
    fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\'', "\\'")),
            other => other.render(),
        }
    }

    /// Integer view of the value, accepting numeric strings.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Calendar-date view of the value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date_naive()),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Truthiness for `and`/`or`/`not`: empty strings, zero, empty
    /// containers and `None` are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Date(_) | Value::DateTime(_) => true,
            Value::Delta(delta) => !delta.is_zero(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    /// Converts a JSON value from the external record shape.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Str(n.to_string()),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts back to JSON. Dates, datetimes and deltas become strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Date(_) | Value::DateTime(_) | Value::Delta(_) => {
                serde_json::Value::String(self.render())
            }
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Renders a delta in `days, h:mm:ss` form.
fn render_delta(delta: TimeDelta) -> String {
    let total_seconds = delta.num_seconds();
    let days = total_seconds.div_euclid(86_400);
    let rest = total_seconds.rem_euclid(86_400);
    let (hours, minutes, seconds) = (rest / 3600, (rest % 3600) / 60, rest % 60);
    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 | -1 => format!("{days} day, {clock}"),
        _ => format!("{days} days, {clock}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_renders_python_style() {
        assert_eq!(Value::Bool(true).render(), "True");
        assert_eq!(Value::Bool(false).render(), "False");
    }

    #[test]
    fn date_renders_iso() {
        let d = NaiveDate::from_ymd_opt(2020, 5, 15).unwrap();
        assert_eq!(Value::Date(d).render(), "2020-05-15");
    }

    #[test]
    fn list_renders_with_quoted_strings() {
        let v = Value::List(vec![Value::from("bank"), Value::from("invoice")]);
        assert_eq!(v.render(), "['bank', 'invoice']");
    }

    #[test]
    fn int_view_accepts_numeric_strings() {
        assert_eq!(Value::from(" 07 ").as_int(), Some(7));
        assert_eq!(Value::from("x").as_int(), None);
        assert_eq!(Value::Int(12).as_int(), Some(12));
    }

    #[test]
    fn delta_renders_days_and_clock() {
        assert_eq!(Value::Delta(TimeDelta::days(7)).render(), "7 days, 0:00:00");
        assert_eq!(Value::Delta(TimeDelta::hours(3)).render(), "3:00:00");
    }

    #[test]
    fn json_roundtrip_for_custom_field_entry() {
        let json: serde_json::Value =
            serde_json::json!({ "field": 4, "value": "INV-2020-001" });
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }
}
