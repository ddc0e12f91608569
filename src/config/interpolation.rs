//! `${name}` substitution inside config values.
//!
//! Every string in the parsed document is scanned for references and
//! rewritten against the [`EvaluationContext`] before the document is decoded
//! into [`super::RawFileConfig`]. `$${` is an escape for a literal `${`.

use super::ParseError;
use super::context::{ContextValue, EvaluationContext};
use regex::{Captures, Regex};
use std::sync::OnceLock;
use toml::Value;

// Alternation order matters: escape, complete reference, dangling opener.
const REFERENCE_PATTERN: &str = r"\$\$\{|\$\{([^}]*)\}|\$\{";
const WHOLE_REFERENCE_PATTERN: &str = r"^\$\{\s*([^}\s]+)\s*\}$";

struct Patterns {
    reference: Regex,
    whole: Regex,
}

static PATTERNS: OnceLock<Result<Patterns, regex::Error>> = OnceLock::new();

fn patterns() -> Result<&'static Patterns, ParseError> {
    PATTERNS
        .get_or_init(|| {
            Ok(Patterns {
                reference: Regex::new(REFERENCE_PATTERN)?,
                whole: Regex::new(WHOLE_REFERENCE_PATTERN)?,
            })
        })
        .as_ref()
        .map_err(|e| ParseError::Pattern(e.clone()))
}

/// Rewrites every string inside `value`, recursing through tables and arrays.
/// `field` names the location for error messages.
pub fn interpolate_value(
    value: Value,
    context: &EvaluationContext,
    field: &str,
) -> Result<Value, ParseError> {
    match value {
        Value::String(text) => interpolate_string(&text, context, field),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| interpolate_value(item, context, &format!("{field}[{index}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Table(table) => {
            let mut rewritten = toml::Table::new();
            for (key, item) in table {
                let path = if field.is_empty() {
                    key.clone()
                } else {
                    format!("{field}.{key}")
                };
                let item = interpolate_value(item, context, &path)?;
                rewritten.insert(key, item);
            }
            Ok(Value::Table(rewritten))
        }
        other => Ok(other),
    }
}

/// A string that is exactly one reference to a list variable becomes an
/// array; everything else stays a string.
pub fn interpolate_string(
    text: &str,
    context: &EvaluationContext,
    field: &str,
) -> Result<Value, ParseError> {
    let patterns = patterns()?;

    if let Some(name) = patterns.whole.captures(text).and_then(|c| c.get(1))
        && let Some(ContextValue::List(items)) = context.get(name.as_str())
    {
        return Ok(Value::Array(
            items.iter().cloned().map(Value::String).collect(),
        ));
    }

    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    for captures in patterns.reference.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        output.push_str(&text[last..whole.start()]);
        output.push_str(&resolve_reference(&captures, whole.as_str(), context, field)?);
        last = whole.end();
    }
    output.push_str(&text[last..]);

    Ok(Value::String(output))
}

fn resolve_reference(
    captures: &Captures<'_>,
    matched: &str,
    context: &EvaluationContext,
    field: &str,
) -> Result<String, ParseError> {
    if matched == "$${" {
        return Ok("${".to_string());
    }

    let Some(name) = captures.get(1) else {
        return Err(ParseError::UnterminatedReference {
            field: field.to_string(),
        });
    };
    let name = name.as_str().trim();

    match context.get(name) {
        Some(ContextValue::Scalar(value)) => Ok(value.clone()),
        Some(ContextValue::List(_)) => Err(ParseError::ListInString {
            name: name.to_string(),
            field: field.to_string(),
        }),
        None => Err(ParseError::UnresolvedVariable {
            name: name.to_string(),
            field: field.to_string(),
        }),
    }
}
