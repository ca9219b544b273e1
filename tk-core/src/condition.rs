//! Applies a single compiled condition to a record.

use crate::coerce::{coerce, Coerced};
use crate::compiler::CompiledCondition;
use crate::error::{EvalError, RuleLocation};
use crate::path::{self, is_null_like, FieldPath};
use crate::rule::{Comparand, FieldPolicy, FieldType, Operator};
use serde_json::Value;

/// What a matching condition reports for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDiagnostics {
    pub field: FieldPath,
    pub value: Value,
}

/// The effect a missing-field / coercion-failure policy has at the point
/// it's consulted.
enum PolicyOutcome {
    ConditionFails,
    ConditionMatches(MatchDiagnostics),
    Raise,
}

fn apply_field_policy(
    policy: FieldPolicy,
    field: FieldPath,
    value: Value,
) -> PolicyOutcome {
    match policy {
        FieldPolicy::Skip => PolicyOutcome::ConditionFails,
        FieldPolicy::Match => PolicyOutcome::ConditionMatches(MatchDiagnostics { field, value }),
        FieldPolicy::Error => PolicyOutcome::Raise,
    }
}

/// Evaluate one condition against a record.
///
/// Returns `Ok(Some(diagnostics))` on match, `Ok(None)` on no match, and
/// `Err` only when a policy set to `error` fires.
pub fn evaluate_condition(
    compiled: &CompiledCondition,
    record: &Value,
    location: &RuleLocation,
) -> Result<Option<MatchDiagnostics>, EvalError> {
    let condition = &compiled.source;

    let resolved = path::resolve(&condition.field, record);

    // is_null/exists are presence checks, not value checks: they define their
    // own behavior for an absent or null field, so they run against the raw
    // resolution and never go through on_missing_field/on_coercion_fail.
    if matches!(condition.op, Operator::IsNull | Operator::Exists) {
        return Ok(evaluate_presence(condition.op, &condition.field, &resolved));
    }

    let candidates: Vec<_> = resolved
        .into_iter()
        .filter(|r| !is_null_like(r.value))
        .collect();

    if candidates.is_empty() {
        return match apply_field_policy(
            condition.on_missing_field,
            condition.field.clone(),
            Value::Null,
        ) {
            PolicyOutcome::ConditionFails => Ok(None),
            PolicyOutcome::ConditionMatches(d) => Ok(Some(d)),
            PolicyOutcome::Raise => Err(EvalError::MissingField {
                location: location.clone(),
                field: condition.field.clone(),
            }),
        };
    }

    // Resolve the comparand once: a literal value/list, or a field_ref
    // (which must yield exactly one non-null-like value, per the same
    // missing-field policy as the primary field).
    let comparand = match &condition.comparand {
        None => None,
        Some(Comparand::Value(v)) => Some(ComparandValues::Scalar(v.clone())),
        Some(Comparand::Values(vs)) => Some(ComparandValues::List(vs.clone())),
        Some(Comparand::FieldRef(field_ref)) => {
            let refs = path::resolve(field_ref, record);
            match refs.into_iter().find(|r| !is_null_like(r.value)) {
                Some(r) => Some(ComparandValues::Scalar(r.value.clone())),
                None => {
                    return match apply_field_policy(
                        condition.on_missing_field,
                        field_ref.clone(),
                        Value::Null,
                    ) {
                        PolicyOutcome::ConditionFails => Ok(None),
                        PolicyOutcome::ConditionMatches(d) => Ok(Some(d)),
                        PolicyOutcome::Raise => Err(EvalError::MissingField {
                            location: location.clone(),
                            field: field_ref.clone(),
                        }),
                    };
                }
            }
        }
    };

    for candidate in &candidates {
        let coerced_value = match coerce(candidate.value, condition.field_type) {
            Ok(c) => c,
            Err(_) => {
                match apply_field_policy(
                    condition.on_coercion_fail,
                    candidate.path.clone(),
                    candidate.value.clone(),
                ) {
                    PolicyOutcome::ConditionFails => continue,
                    PolicyOutcome::ConditionMatches(d) => return Ok(Some(d)),
                    PolicyOutcome::Raise => {
                        return Err(EvalError::CoercionFailed {
                            location: location.clone(),
                            field: candidate.path.clone(),
                            field_type: condition.field_type,
                        })
                    }
                }
            }
        };

        let matched = match apply_operator(
            condition.op,
            condition.field_type,
            &coerced_value,
            comparand.as_ref(),
        ) {
            Ok(b) => b,
            Err(_) => {
                match apply_field_policy(
                    condition.on_coercion_fail,
                    candidate.path.clone(),
                    candidate.value.clone(),
                ) {
                    PolicyOutcome::ConditionFails => continue,
                    PolicyOutcome::ConditionMatches(d) => return Ok(Some(d)),
                    PolicyOutcome::Raise => {
                        return Err(EvalError::CoercionFailed {
                            location: location.clone(),
                            field: candidate.path.clone(),
                            field_type: condition.field_type,
                        })
                    }
                }
            }
        };

        if matched {
            return Ok(Some(MatchDiagnostics {
                field: candidate.path.clone(),
                value: candidate.value.clone(),
            }));
        }
    }

    Ok(None)
}

/// `is_null`/`exists` against the unfiltered resolution: `is_null` matches
/// an absent field or the first null-like candidate; `exists` matches the
/// first non-null candidate. Wildcard fan-out keeps the same first-match-wins
/// behavior as every other operator.
fn evaluate_presence(
    op: Operator,
    field: &FieldPath,
    resolved: &[path::Resolved],
) -> Option<MatchDiagnostics> {
    match op {
        Operator::IsNull => {
            if resolved.is_empty() {
                return Some(MatchDiagnostics { field: field.clone(), value: Value::Null });
            }
            resolved.iter().find(|r| is_null_like(r.value)).map(|r| MatchDiagnostics {
                field: r.path.clone(),
                value: r.value.clone(),
            })
        }
        Operator::Exists => resolved.iter().find(|r| !is_null_like(r.value)).map(|r| MatchDiagnostics {
            field: r.path.clone(),
            value: r.value.clone(),
        }),
        _ => unreachable!("evaluate_presence only called for IsNull/Exists"),
    }
}

enum ComparandValues {
    Scalar(Value),
    List(Vec<Value>),
}

/// Coercion failure of the comparand itself (distinct from the resolved
/// field value, which is handled by the caller before this is invoked).
struct ComparandCoercionFailure;

fn apply_operator(
    op: Operator,
    field_type: FieldType,
    value: &Coerced,
    comparand: Option<&ComparandValues>,
) -> Result<bool, ComparandCoercionFailure> {
    match op {
        // evaluate_condition intercepts IsNull/Exists before candidates are
        // built and never calls apply_operator for them; kept here only for
        // exhaustiveness over Operator.
        Operator::IsNull => Ok(false),
        Operator::Exists => Ok(true),
        Operator::In => {
            let Some(ComparandValues::List(values)) = comparand else {
                return Ok(false);
            };
            for candidate in values {
                let coerced = coerce(candidate, field_type).map_err(|_| ComparandCoercionFailure)?;
                if values_equal(value, &coerced) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Operator::Eq | Operator::Neq | Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
        | Operator::Prefix | Operator::Suffix => {
            let Some(ComparandValues::Scalar(raw)) = comparand else {
                return Ok(false);
            };
            let coerced = coerce(raw, field_type).map_err(|_| ComparandCoercionFailure)?;
            Ok(match op {
                Operator::Eq => values_equal(value, &coerced),
                Operator::Neq => !values_equal(value, &coerced),
                Operator::Lt => numeric_cmp(value, &coerced, |a, b| a < b),
                Operator::Lte => numeric_cmp(value, &coerced, |a, b| a <= b),
                Operator::Gt => numeric_cmp(value, &coerced, |a, b| a > b),
                Operator::Gte => numeric_cmp(value, &coerced, |a, b| a >= b),
                Operator::Prefix => text_cmp(value, &coerced, str::starts_with),
                Operator::Suffix => text_cmp(value, &coerced, str::ends_with),
                _ => unreachable!(),
            })
        }
    }
}

/// Structural equality after coercion. Float equality is exact IEEE-754
/// comparison; NaN is never equal to anything, including itself.
fn values_equal(a: &Coerced, b: &Coerced) -> bool {
    match (a, b) {
        (Coerced::Numeric(x), Coerced::Numeric(y)) => x == y,
        (Coerced::Text(x), Coerced::Text(y)) => x == y,
        (Coerced::Boolean(x), Coerced::Boolean(y)) => x == y,
        (Coerced::Any(x), Coerced::Any(y)) => x == y,
        _ => false,
    }
}

fn numeric_cmp(a: &Coerced, b: &Coerced, f: impl Fn(f64, f64) -> bool) -> bool {
    match (a, b) {
        (Coerced::Numeric(x), Coerced::Numeric(y)) => f(*x, *y),
        _ => false,
    }
}

fn text_cmp(a: &Coerced, b: &Coerced, f: impl Fn(&str, &str) -> bool) -> bool {
    match (a, b) {
        (Coerced::Text(x), Coerced::Text(y)) => f(x.as_str(), y.as_str()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::RuleId;
    use crate::path::Segment;
    use serde_json::json;

    fn loc() -> RuleLocation {
        RuleLocation::condition(RuleId::now_v7(), 0, 0)
    }

    fn condition(
        field_type: FieldType,
        op: Operator,
        comparand: Option<Comparand>,
    ) -> CompiledCondition {
        crate::compiler::CompiledCondition {
            source: crate::rule::Condition {
                field: FieldPath::new(vec![Segment::Key("x".into())]),
                field_type,
                op,
                comparand,
                on_missing_field: FieldPolicy::Skip,
                on_coercion_fail: FieldPolicy::Skip,
            },
            cost: 1,
        }
    }

    #[test]
    fn gt_matches_when_numeric_comparison_holds() {
        let c = condition(FieldType::Numeric, Operator::Gt, Some(Comparand::Value(json!(100))));
        let record = json!({"x": 105});
        let result = evaluate_condition(&c, &record, &loc()).unwrap();
        assert_eq!(result.unwrap().value, json!(105));
    }

    #[test]
    fn missing_field_skip_means_no_match_no_error() {
        let c = condition(FieldType::Numeric, Operator::Gt, Some(Comparand::Value(json!(0))));
        let result = evaluate_condition(&c, &json!({}), &loc()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn missing_field_error_raises_but_coercion_skip_does_not() {
        let mut c = condition(FieldType::Numeric, Operator::Gt, Some(Comparand::Value(json!(0))));
        c.source.on_missing_field = FieldPolicy::Error;
        c.source.on_coercion_fail = FieldPolicy::Skip;

        let missing = evaluate_condition(&c, &json!({}), &loc());
        assert!(matches!(missing, Err(EvalError::MissingField { .. })));

        let bad_type = evaluate_condition(&c, &json!({"x": "abc"}), &loc()).unwrap();
        assert!(bad_type.is_none());
    }

    #[test]
    fn in_matches_membership() {
        let c = condition(
            FieldType::Numeric,
            Operator::In,
            Some(Comparand::Values(vec![json!(1), json!(2), json!(3)])),
        );
        let hit = evaluate_condition(&c, &json!({"x": 2}), &loc()).unwrap();
        assert!(hit.is_some());
        let miss = evaluate_condition(&c, &json!({"x": 9}), &loc()).unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn is_null_on_present_value_is_false() {
        let c = condition(FieldType::Any, Operator::IsNull, None);
        let result = evaluate_condition(&c, &json!({"x": 1}), &loc()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn is_null_on_absent_field_matches_under_default_skip_policy() {
        let c = condition(FieldType::Any, Operator::IsNull, None);
        let result = evaluate_condition(&c, &json!({}), &loc()).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn is_null_on_explicit_null_matches_under_default_skip_policy() {
        let c = condition(FieldType::Any, Operator::IsNull, None);
        let result = evaluate_condition(&c, &json!({"x": null}), &loc()).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn exists_on_present_value_is_true() {
        let c = condition(FieldType::Any, Operator::Exists, None);
        let result = evaluate_condition(&c, &json!({"x": 1}), &loc()).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn exists_on_absent_or_null_field_is_false() {
        let c = condition(FieldType::Any, Operator::Exists, None);
        assert!(evaluate_condition(&c, &json!({}), &loc()).unwrap().is_none());
        assert!(evaluate_condition(&c, &json!({"x": null}), &loc()).unwrap().is_none());
    }

    #[test]
    fn wildcard_short_circuits_on_first_match() {
        let mut c = condition(FieldType::Numeric, Operator::Gt, Some(Comparand::Value(json!(100))));
        c.source.field = FieldPath::new(vec![
            Segment::Key("readings".into()),
            Segment::Wildcard,
            Segment::Key("temp".into()),
        ]);
        let record = json!({"readings": [{"temp": 50}, {"temp": 105}, {"temp": 200}]});
        let result = evaluate_condition(&c, &record, &loc()).unwrap().unwrap();
        assert_eq!(result.value, json!(105));
        assert_eq!(
            result.field,
            FieldPath::new(vec![
                Segment::Key("readings".into()),
                Segment::Index(1),
                Segment::Key("temp".into()),
            ])
        );
    }

    #[test]
    fn prefix_is_byte_oriented_no_locale() {
        let c = condition(FieldType::Text, Operator::Prefix, Some(Comparand::Value(json!("ab"))));
        let hit = evaluate_condition(&c, &json!({"x": "abc"}), &loc()).unwrap();
        assert!(hit.is_some());
        let miss = evaluate_condition(&c, &json!({"x": "xabc"}), &loc()).unwrap();
        assert!(miss.is_none());
    }
}
