//! Type coercion between JSON values and a condition's declared `field_type`.

use crate::rule::FieldType;
use serde_json::Value;

/// The outcome of attempting to coerce a JSON value to a `field_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// The value matched (or was successfully converted to) the target type.
    Numeric(f64),
    Text(String),
    Boolean(bool),
    /// `field_type = any`: no coercion is attempted, compare by dynamic type.
    Any(Value),
}

/// Coercion failed: the value was present and non-null but could not be
/// converted to the target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionFailure;

/// Coerce a resolved value to the given field type.
///
/// Callers must check for null-likeness (`Value::is_null`) *before* calling
/// this function — null-like values are governed by `on_missing_field`, not
/// `on_coercion_fail`, and this function has no opinion on that policy.
pub fn coerce(value: &Value, field_type: FieldType) -> Result<Coerced, CoercionFailure> {
    match field_type {
        FieldType::Any => Ok(Coerced::Any(value.clone())),
        FieldType::Numeric => coerce_numeric(value),
        FieldType::Text => coerce_text(value),
        FieldType::Boolean => coerce_boolean(value),
    }
}

fn coerce_numeric(value: &Value) -> Result<Coerced, CoercionFailure> {
    match value {
        Value::Number(n) => n.as_f64().map(Coerced::Numeric).ok_or(CoercionFailure),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Coerced::Numeric)
            .map_err(|_| CoercionFailure),
        _ => Err(CoercionFailure),
    }
}

fn coerce_text(value: &Value) -> Result<Coerced, CoercionFailure> {
    match value {
        Value::String(s) => Ok(Coerced::Text(s.clone())),
        Value::Bool(b) => Ok(Coerced::Text(b.to_string())),
        Value::Number(n) => Ok(Coerced::Text(format_number(n))),
        _ => Err(CoercionFailure),
    }
}

fn coerce_boolean(value: &Value) -> Result<Coerced, CoercionFailure> {
    match value {
        Value::Bool(b) => Ok(Coerced::Boolean(*b)),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(Coerced::Boolean(true)),
            "false" => Ok(Coerced::Boolean(false)),
            _ => Err(CoercionFailure),
        },
        _ => Err(CoercionFailure),
    }
}

/// Canonical decimal rendering: integers with no trailing zeros / fraction,
/// floats with their shortest round-tripping representation.
fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    n.as_f64().map(|f| f.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_accepts_native_number() {
        assert_eq!(coerce(&json!(42), FieldType::Numeric), Ok(Coerced::Numeric(42.0)));
    }

    #[test]
    fn numeric_parses_trimmed_string() {
        assert_eq!(
            coerce(&json!("  3.5  "), FieldType::Numeric),
            Ok(Coerced::Numeric(3.5))
        );
    }

    #[test]
    fn numeric_rejects_boolean() {
        assert_eq!(coerce(&json!(true), FieldType::Numeric), Err(CoercionFailure));
    }

    #[test]
    fn numeric_rejects_unparseable_string() {
        assert_eq!(coerce(&json!("abc"), FieldType::Numeric), Err(CoercionFailure));
    }

    #[test]
    fn text_stringifies_bool_and_number() {
        assert_eq!(
            coerce(&json!(true), FieldType::Text),
            Ok(Coerced::Text("true".into()))
        );
        assert_eq!(
            coerce(&json!(7), FieldType::Text),
            Ok(Coerced::Text("7".into()))
        );
    }

    #[test]
    fn text_rejects_object_and_array() {
        assert_eq!(coerce(&json!({"a":1}), FieldType::Text), Err(CoercionFailure));
        assert_eq!(coerce(&json!([1,2]), FieldType::Text), Err(CoercionFailure));
    }

    #[test]
    fn boolean_accepts_case_insensitive_strings() {
        assert_eq!(
            coerce(&json!("TRUE"), FieldType::Boolean),
            Ok(Coerced::Boolean(true))
        );
        assert_eq!(
            coerce(&json!("False"), FieldType::Boolean),
            Ok(Coerced::Boolean(false))
        );
    }

    #[test]
    fn boolean_rejects_numeric() {
        assert_eq!(coerce(&json!(1), FieldType::Boolean), Err(CoercionFailure));
    }

    #[test]
    fn any_performs_no_coercion() {
        assert_eq!(coerce(&json!("x"), FieldType::Any), Ok(Coerced::Any(json!("x"))));
    }
}
