//! Tests for template compilation and rendering.

use chrono::NaiveDate;
use metafix_expr::{DocumentCounts, Environment, EvalError, EvalResult, NoCounts, Template};
use metafix_model::{Metadata, Value};

fn context() -> Metadata {
    let mut ctx = Metadata::new();
    ctx.set("correspondent", Value::from("The Bank"));
    ctx.set("document_type", Value::from("Transfer Confirmation"));
    ctx.set("title", Value::from("scan_0001"));
    ctx.set("created_year", Value::from("2020"));
    ctx.set("created_month", Value::from("05"));
    ctx.set("created_day", Value::from("15"));
    ctx.set(
        "created_date_object",
        Value::Date(NaiveDate::from_ymd_opt(2020, 5, 15).unwrap()),
    );
    ctx.set("asn", Value::Int(120));
    ctx
}

fn render(template: &str) -> EvalResult<String> {
    let env = Environment::new(&NoCounts);
    Template::parse(template).unwrap().render(&context(), &env)
}

#[test]
fn interpolates_multiple_fields() {
    assert_eq!(
        render("{{ created_year }}-{{ created_month }}-{{ created_day }} -- {{ title }}").unwrap(),
        "2020-05-15 -- scan_0001"
    );
}

#[test]
fn match_predicate_renders_true() {
    let env = Environment::new(&NoCounts);
    let template =
        Template::parse("{{ correspondent == 'The Bank' and document_type == 'Transfer Confirmation' }}")
            .unwrap();
    assert!(template.render_is_true(&context(), &env).unwrap());

    let template = Template::parse("{{ correspondent == 'Someone Else' }}").unwrap();
    assert!(!template.render_is_true(&context(), &env).unwrap());
}

#[test]
fn validation_is_true_unless_literal_false() {
    let env = Environment::new(&NoCounts);
    let ctx = context();
    let template = Template::parse("{{ asn > 100 }}").unwrap();
    assert!(template.render_is_not_false(&ctx, &env).unwrap());
    let template = Template::parse("{{ asn > 1000 }}").unwrap();
    assert!(!template.render_is_not_false(&ctx, &env).unwrap());
    // Non-boolean output counts as valid.
    let template = Template::parse("anything").unwrap();
    assert!(template.render_is_not_false(&ctx, &env).unwrap());
}

#[test]
fn undefined_names_render_empty() {
    assert_eq!(render("[{{ no_such_field }}]").unwrap(), "[]");
    assert_eq!(render("{{ no_such_field == 'x' }}").unwrap(), "False");
}

#[test]
fn expand_two_digit_year_uses_current_century() {
    let env = Environment::new(&NoCounts)
        .with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    let mut ctx = Metadata::new();
    ctx.set("year", Value::from("07"));
    let template = Template::parse("{{ year | expand_two_digit_year }}").unwrap();
    assert_eq!(template.render(&ctx, &env).unwrap(), "2007");
}

#[test]
fn expand_two_digit_year_with_explicit_century() {
    let env = Environment::new(&NoCounts);
    let mut ctx = Metadata::new();
    ctx.set("year", Value::from("07"));
    let template = Template::parse("{{ year | expand_two_digit_year(19) }}").unwrap();
    assert_eq!(template.render(&ctx, &env).unwrap(), "1907");
}

#[test]
fn expand_two_digit_year_passes_full_years_through() {
    let env = Environment::new(&NoCounts);
    let mut ctx = Metadata::new();
    ctx.set("year", Value::from("1998"));
    let template = Template::parse("{{ year | expand_two_digit_year(19) }}").unwrap();
    assert_eq!(template.render(&ctx, &env).unwrap(), "1998");
}

#[test]
fn regex_match_is_anchored_at_start() {
    assert_eq!(render(r"{{ title | regex_match('scan_\\d+') }}").unwrap(), "True");
    assert_eq!(render(r"{{ title | regex_match('\\d+') }}").unwrap(), "False");
}

#[test]
fn regex_sub_replaces_with_capture_groups() {
    assert_eq!(
        render(r"{{ title | regex_sub('scan_(\\d+)', 'document $1') }}").unwrap(),
        "document 0001"
    );
}

#[test]
fn date_arithmetic_and_attributes() {
    assert_eq!(
        render("{{ (created_date_object - timedelta(days=20)).month }}").unwrap(),
        "4"
    );
    assert_eq!(render("{{ date(2021, 1, 1) - timedelta(days=1) }}").unwrap(), "2020-12-31");
}

#[test]
fn last_date_object_of_month_handles_leap_years_and_december() {
    assert_eq!(
        render("{{ last_date_object_of_month(date(2020, 2, 10)) }}").unwrap(),
        "2020-02-29"
    );
    assert_eq!(
        render("{{ last_date_object_of_month(date(2021, 12, 3)) }}").unwrap(),
        "2021-12-31"
    );
    // Non-date input yields None.
    assert_eq!(render("{{ last_date_object_of_month(title) }}").unwrap(), "None");
}

struct FixedCounts(u64);

impl DocumentCounts for FixedCounts {
    fn count(&self, constraints: &[(String, Value)]) -> EvalResult<u64> {
        assert!(!constraints.is_empty());
        Ok(self.0)
    }
}

#[test]
fn num_documents_delegates_to_the_collaborator() {
    let counts = FixedCounts(1);
    let env = Environment::new(&counts);
    let template = Template::parse(
        "{{ num_documents(correspondent=correspondent, created_year=created_year) == 1 }}",
    )
    .unwrap();
    assert!(template.render_is_true(&context(), &env).unwrap());
}

#[test]
fn num_documents_without_a_store_is_a_count_error() {
    let env = Environment::new(&NoCounts);
    let template = Template::parse("{{ num_documents(correspondent=correspondent) }}").unwrap();
    assert!(matches!(
        template.render(&context(), &env),
        Err(EvalError::Count(_))
    ));
}

#[test]
fn render_errors_are_recoverable_values() {
    // A type error in one template does not panic; the caller decides.
    let env = Environment::new(&NoCounts);
    let template = Template::parse("{{ title - 1 }}").unwrap();
    assert!(matches!(
        template.render(&context(), &env),
        Err(EvalError::Type(_))
    ));
}

#[test]
fn unclosed_delimiter_fails_at_parse_time() {
    assert!(Template::parse("{{ title").is_err());
    assert!(Template::parse("plain text").is_ok());
}
