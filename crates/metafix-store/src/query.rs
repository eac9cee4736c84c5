//! Selector and count-query types for the document store.

use chrono::NaiveDate;
use metafix_model::{ItemKind, Value};

/// Which documents a run operates on.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSelector {
    All,
    ById(u64),
    /// Documents classified with the named correspondent, type, tag or
    /// storage path.
    ByItem { kind: ItemKind, name: String },
}

/// A filtered document count, as used by the `num_documents` template
/// global. All constraints are conjunctive; name constraints compare
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub correspondent: Option<String>,
    pub document_type: Option<String>,
    pub storage_path: Option<String>,
    pub title: Option<String>,
    pub asn: Option<i64>,
    pub created_year: Option<i64>,
    pub created_month: Option<i64>,
    pub created_day: Option<i64>,
    pub added_year: Option<i64>,
    pub added_month: Option<i64>,
    pub added_day: Option<i64>,
    /// Exclusive bounds on the creation date.
    pub created_after: Option<NaiveDate>,
    pub created_before: Option<NaiveDate>,
    /// Exclusive bounds on the added date.
    pub added_after: Option<NaiveDate>,
    pub added_before: Option<NaiveDate>,
}

impl DocumentQuery {
    /// Builds a query from the keyword constraints of a `num_documents`
    /// call. Unknown constraint names are rejected so typos surface in
    /// logs instead of silently matching everything.
    pub fn from_constraints(constraints: &[(String, Value)]) -> Result<DocumentQuery, String> {
        let mut query = DocumentQuery::default();
        for (name, value) in constraints {
            match name.as_str() {
                "correspondent" => query.correspondent = Some(value.render()),
                "document_type" => query.document_type = Some(value.render()),
                "storage_path" => query.storage_path = Some(value.render()),
                "title" => query.title = Some(value.render()),
                "asn" => query.asn = Some(int_constraint(name, value)?),
                "created_year" => query.created_year = Some(int_constraint(name, value)?),
                "created_month" => query.created_month = Some(int_constraint(name, value)?),
                "created_day" => query.created_day = Some(int_constraint(name, value)?),
                "added_year" => query.added_year = Some(int_constraint(name, value)?),
                "added_month" => query.added_month = Some(int_constraint(name, value)?),
                "added_day" => query.added_day = Some(int_constraint(name, value)?),
                "created_range" => {
                    let (after, before) = range_constraint(name, value)?;
                    query.created_after = after;
                    query.created_before = before;
                }
                "added_range" => {
                    let (after, before) = range_constraint(name, value)?;
                    query.added_after = after;
                    query.added_before = before;
                }
                "created_date_object" => {
                    let date = date_constraint(name, value)?;
                    query.created_year = Some(i64::from(chrono::Datelike::year(&date)));
                    query.created_month = Some(i64::from(chrono::Datelike::month(&date)));
                    query.created_day = Some(i64::from(chrono::Datelike::day(&date)));
                }
                "added_date_object" => {
                    let date = date_constraint(name, value)?;
                    query.added_year = Some(i64::from(chrono::Datelike::year(&date)));
                    query.added_month = Some(i64::from(chrono::Datelike::month(&date)));
                    query.added_day = Some(i64::from(chrono::Datelike::day(&date)));
                }
                other => return Err(format!("unknown constraint '{other}'")),
            }
        }
        Ok(query)
    }
}

fn int_constraint(name: &str, value: &Value) -> Result<i64, String> {
    value
        .as_int()
        .ok_or_else(|| format!("constraint '{name}' must be an integer, got '{}'", value.render()))
}

fn date_constraint(name: &str, value: &Value) -> Result<NaiveDate, String> {
    value
        .as_date()
        .ok_or_else(|| format!("constraint '{name}' must be a date, got '{}'", value.render()))
}

/// A range constraint is a two-element list; either end may be a non-date
/// (e.g. `None`) to leave that bound open.
fn range_constraint(
    name: &str,
    value: &Value,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), String> {
    let Value::List(items) = value else {
        return Err(format!("constraint '{name}' must be a two-element list"));
    };
    let [start, end] = items.as_slice() else {
        return Err(format!("constraint '{name}' must be a two-element list"));
    };
    Ok((start.as_date(), end.as_date()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_from_selector_fields() {
        let constraints = vec![
            ("correspondent".to_string(), Value::from("The Bank")),
            ("created_year".to_string(), Value::from("2020")),
        ];
        let query = DocumentQuery::from_constraints(&constraints).unwrap();
        assert_eq!(query.correspondent.as_deref(), Some("The Bank"));
        assert_eq!(query.created_year, Some(2020));
        assert_eq!(query.asn, None);
    }

    #[test]
    fn date_object_expands_to_components() {
        let date = NaiveDate::from_ymd_opt(2020, 5, 15).unwrap();
        let constraints = vec![("created_date_object".to_string(), Value::Date(date))];
        let query = DocumentQuery::from_constraints(&constraints).unwrap();
        assert_eq!(
            (query.created_year, query.created_month, query.created_day),
            (Some(2020), Some(5), Some(15))
        );
    }

    #[test]
    fn range_accepts_open_ends() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let constraints = vec![(
            "added_range".to_string(),
            Value::List(vec![Value::Date(start), Value::None]),
        )];
        let query = DocumentQuery::from_constraints(&constraints).unwrap();
        assert_eq!(query.added_after, Some(start));
        assert_eq!(query.added_before, None);
    }

    #[test]
    fn unknown_constraint_is_rejected() {
        let constraints = vec![("corespondent".to_string(), Value::from("typo"))];
        assert!(DocumentQuery::from_constraints(&constraints).is_err());
    }
}
