//! Compiled templates: literal text interleaved with `{{ … }}` expressions.

use metafix_model::Metadata;

use crate::error::{EvalResult, TemplateError};
use crate::eval::{Environment, eval};
use crate::parser::{Expr, parse_expression};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Expr(Expr),
}

/// A template compiled once at rule-load time and rendered per document.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compiles template text. Expressions are delimited by `{{` and `}}`.
    pub fn parse(source: &str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let after_open = &rest[open + 2..];
            let close = after_open
                .find("}}")
                .ok_or(TemplateError::UnclosedDelimiter)?;
            let expr = parse_expression(&after_open[..close])?;
            segments.push(Segment::Expr(expr));
            rest = &after_open[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Template {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template text, for log messages.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders against a metadata context.
    pub fn render(&self, ctx: &Metadata, env: &Environment<'_>) -> EvalResult<String> {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Expr(expr) => output.push_str(&eval(expr, ctx, env)?.render()),
            }
        }
        Ok(output)
    }

    /// Renders and applies the match-predicate convention: the output must
    /// equal the literal string `True`.
    pub fn render_is_true(&self, ctx: &Metadata, env: &Environment<'_>) -> EvalResult<bool> {
        Ok(self.render(ctx, env)? == "True")
    }

    /// Renders and applies the validation convention: anything but the
    /// literal string `False` (after trimming) counts as valid.
    pub fn render_is_not_false(&self, ctx: &Metadata, env: &Environment<'_>) -> EvalResult<bool> {
        Ok(self.render(ctx, env)?.trim() != "False")
    }
}
