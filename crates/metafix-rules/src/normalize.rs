//! Creation-date normalization.
//!
//! Extraction and postprocessing templates hand back `created_year`,
//! `created_month` and `created_day` as free-form strings. This module turns
//! them back into a coherent date, falling back to the previous value for
//! any component that does not survive parsing, and recomputes the derived
//! `created`, `created_date` and `created_date_object` fields.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use metafix_model::{Metadata, Value, fields};

const MONTH_ABBR: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Hour used when the fallback record carries no parsable timestamp.
const DEFAULT_HOUR: u32 = 12;

/// Normalizes the creation-date fields of `candidate`, taking replacement
/// components from `fallback` where the candidate's do not parse. Must run
/// after every step that may have rewritten a date component.
pub fn normalize_created(candidate: &Metadata, fallback: &Metadata) -> Metadata {
    let mut result = candidate.clone();

    let year = normalize_year(&candidate.rendered(fields::CREATED_YEAR))
        .unwrap_or_else(|| fallback.rendered(fields::CREATED_YEAR));
    let month = normalize_month(&candidate.rendered(fields::CREATED_MONTH))
        .unwrap_or_else(|| fallback.rendered(fields::CREATED_MONTH));
    let day = normalize_day(&candidate.rendered(fields::CREATED_DAY))
        .unwrap_or_else(|| fallback.rendered(fields::CREATED_DAY));

    let fallback_stamp =
        DateTime::parse_from_rfc3339(&fallback.rendered(fields::CREATED)).ok();

    // A day that parsed but overflows the month (e.g. "40") still has to
    // fall back, which only shows up once the full date is assembled.
    let date = build_date(&year, &month, &day)
        .or_else(|| build_date(&year, &month, &fallback.rendered(fields::CREATED_DAY)))
        .or_else(|| fallback_stamp.map(|stamp| stamp.date_naive()));

    let Some(date) = date else {
        // Nothing recoverable; carry the fallback's date fields verbatim.
        for key in [
            fields::CREATED_YEAR,
            fields::CREATED_MONTH,
            fields::CREATED_DAY,
            fields::CREATED,
            fields::CREATED_DATE,
            fields::CREATED_DATE_OBJECT,
        ] {
            if let Some(value) = fallback.get(key) {
                result.set(key, value.clone());
            }
        }
        return result;
    };

    result.set(fields::CREATED_YEAR, Value::from(date.year().to_string()));
    result.set(fields::CREATED_MONTH, Value::from(format!("{:02}", date.month())));
    result.set(fields::CREATED_DAY, Value::from(format!("{:02}", date.day())));

    let stamp = match fallback_stamp {
        Some(previous) => date
            .and_hms_opt(previous.hour(), 0, 0)
            .and_then(|naive| naive.and_local_timezone(*previous.offset()).single()),
        None => date
            .and_hms_opt(DEFAULT_HOUR, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset()),
    };
    if let Some(stamp) = stamp {
        result.set(fields::CREATED, Value::from(stamp.to_rfc3339()));
    }
    result.set(fields::CREATED_DATE, Value::from(date.format("%Y-%m-%d").to_string()));
    result.set(fields::CREATED_DATE_OBJECT, Value::Date(date));

    result
}

fn normalize_year(raw: &str) -> Option<String> {
    raw.trim().parse::<i64>().ok().map(|year| year.to_string())
}

/// Integer in 1..=12, or an English month name or abbreviation.
fn normalize_month(raw: &str) -> Option<String> {
    if let Ok(month) = raw.trim().parse::<i64>() {
        return (1..=12).contains(&month).then(|| format!("{month:02}"));
    }
    let lower = raw.trim().to_lowercase();
    MONTH_ABBR
        .iter()
        .position(|abbr| *abbr == lower)
        .or_else(|| MONTH_NAMES.iter().position(|name| *name == lower))
        .map(|index| format!("{:02}", index + 1))
}

fn normalize_day(raw: &str) -> Option<String> {
    raw.trim().parse::<i64>().ok().map(|day| format!("{day:02}"))
}

fn build_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        year.trim().parse().ok()?,
        month.trim().parse().ok()?,
        day.trim().parse().ok()?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Metadata {
        let mut metadata = Metadata::new();
        metadata.set(fields::CREATED, Value::from("2020-05-15T10:00:00+00:00"));
        metadata.set(fields::CREATED_YEAR, Value::from("2020"));
        metadata.set(fields::CREATED_MONTH, Value::from("05"));
        metadata.set(fields::CREATED_DAY, Value::from("15"));
        metadata
    }

    fn with_components(year: &str, month: &str, day: &str) -> Metadata {
        let mut candidate = base();
        candidate.set(fields::CREATED_YEAR, Value::from(year));
        candidate.set(fields::CREATED_MONTH, Value::from(month));
        candidate.set(fields::CREATED_DAY, Value::from(day));
        candidate
    }

    #[test]
    fn invalid_month_and_day_fall_back_componentwise() {
        let normalized = normalize_created(&with_components("2020", "13", "40"), &base());
        assert_eq!(normalized.rendered(fields::CREATED_MONTH), "05");
        assert_eq!(normalized.rendered(fields::CREATED_DAY), "15");
        assert_eq!(normalized.rendered(fields::CREATED_DATE), "2020-05-15");
        assert_eq!(normalized.rendered(fields::CREATED), "2020-05-15T10:00:00+00:00");
    }

    #[test]
    fn month_names_are_matched_case_insensitively() {
        let normalized = normalize_created(&with_components("2021", "March", "3"), &base());
        assert_eq!(normalized.rendered(fields::CREATED_MONTH), "03");
        assert_eq!(normalized.rendered(fields::CREATED_DATE), "2021-03-03");

        let normalized = normalize_created(&with_components("2021", "DEC", "31"), &base());
        assert_eq!(normalized.rendered(fields::CREATED_DATE), "2021-12-31");
    }

    #[test]
    fn fallback_hour_and_offset_are_preserved() {
        let mut fallback = base();
        fallback.set(fields::CREATED, Value::from("2020-05-15T08:00:00+02:00"));
        let normalized = normalize_created(&with_components("2019", "1", "2"), &fallback);
        assert_eq!(normalized.rendered(fields::CREATED), "2019-01-02T08:00:00+02:00");
        assert_eq!(normalized.rendered(fields::CREATED_DATE), "2019-01-02");
    }

    #[test]
    fn missing_fallback_timestamp_uses_midday_utc() {
        let mut fallback = base();
        fallback.remove(fields::CREATED);
        let mut candidate = with_components("2019", "1", "2");
        candidate.remove(fields::CREATED);
        let normalized = normalize_created(&candidate, &fallback);
        assert_eq!(normalized.rendered(fields::CREATED), "2019-01-02T12:00:00+00:00");
    }

    #[test]
    fn date_object_tracks_the_normalized_components() {
        let normalized = normalize_created(&with_components("2022", "July", "08"), &base());
        assert_eq!(
            normalized.get(fields::CREATED_DATE_OBJECT),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2022, 7, 8).unwrap()))
        );
    }

    #[test]
    fn unparsable_everything_keeps_fallback_fields() {
        let mut fallback = Metadata::new();
        fallback.set(fields::CREATED_YEAR, Value::from("unknown"));
        let normalized = normalize_created(&fallback, &fallback);
        assert_eq!(normalized.rendered(fields::CREATED_YEAR), "unknown");
        assert!(!normalized.contains(fields::CREATED_DATE));
    }
}
