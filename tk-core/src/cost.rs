//! Compile-time predicate cost estimation.
//!
//! The figure drives two things: rejecting pathologically expensive rules
//! at compile time, and ordering predicates within a group cheapest-first.

use crate::path::{FieldPath, Segment};
use crate::rule::{Condition, FieldType, Operator};

/// Per-rule hard budget: rules estimated above this are rejected outright.
pub const HARD_BUDGET: u64 = 2_000;

/// Per-rule soft budget: rules above this are accepted with a warning.
pub const SOFT_BUDGET: u64 = 1_000;

fn lookup_cost(path: &FieldPath) -> u64 {
    path.0.iter().fold(1, |acc, seg| {
        let segment_cost = match seg {
            Segment::Key(_) => 1,
            Segment::Index(_) => 1,
            Segment::Wildcard => 10,
        };
        acc * segment_cost
    })
}

fn operator_base(op: Operator) -> u64 {
    match op {
        Operator::Eq
        | Operator::Neq
        | Operator::Lt
        | Operator::Lte
        | Operator::Gt
        | Operator::Gte
        | Operator::IsNull
        | Operator::Exists => 1,
        Operator::Prefix | Operator::Suffix => 3,
        Operator::In => 1,
    }
}

fn in_list_len(condition: &Condition) -> u64 {
    match &condition.comparand {
        Some(crate::rule::Comparand::Values(vs)) => vs.len() as u64,
        _ => 0,
    }
}

fn field_type_factor(field_type: FieldType) -> u64 {
    match field_type {
        FieldType::Numeric => 1,
        FieldType::Text => 2,
        FieldType::Boolean => 1,
        FieldType::Any => 1,
    }
}

fn execution_cost(condition: &Condition) -> u64 {
    let base = operator_base(condition.op) + in_list_len(condition) / 8;
    base * field_type_factor(condition.field_type)
}

/// Estimate the cost of evaluating a single condition.
pub fn condition_cost(condition: &Condition) -> u64 {
    lookup_cost(&condition.field) * execution_cost(condition)
}

/// Estimate the total cost of a rule body: sum over all conditions in all
/// groups (the evaluator may short-circuit at runtime, but the compile-time
/// estimate is the pessimistic worst case).
pub fn rule_cost(body: &crate::rule::RuleBody) -> u64 {
    body.groups
        .iter()
        .flat_map(|g| g.conditions.iter())
        .map(condition_cost)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{FieldPolicy, OrGroup, RuleBody};
    use serde_json::json;

    fn cond(field: FieldPath, field_type: FieldType, op: Operator) -> Condition {
        Condition {
            field,
            field_type,
            op,
            comparand: Some(crate::rule::Comparand::Value(json!(1))),
            on_missing_field: FieldPolicy::Skip,
            on_coercion_fail: FieldPolicy::Skip,
        }
    }

    #[test]
    fn wildcard_segments_multiply_lookup_cost() {
        let plain = FieldPath::new(vec![Segment::Key("a".into())]);
        let wild = FieldPath::new(vec![Segment::Wildcard, Segment::Wildcard]);
        assert!(lookup_cost(&wild) > lookup_cost(&plain));
        assert_eq!(lookup_cost(&wild), 100);
    }

    #[test]
    fn text_predicates_cost_more_than_numeric() {
        let path = FieldPath::new(vec![Segment::Key("a".into())]);
        let numeric = cond(path.clone(), FieldType::Numeric, Operator::Gt);
        let text = cond(path, FieldType::Text, Operator::Prefix);
        assert!(condition_cost(&text) > condition_cost(&numeric));
    }

    #[test]
    fn rule_cost_sums_across_groups() {
        let path = FieldPath::new(vec![Segment::Key("a".into())]);
        let c = cond(path, FieldType::Numeric, Operator::Eq);
        let body = RuleBody {
            groups: vec![
                OrGroup {
                    conditions: vec![c.clone(), c.clone()],
                },
                OrGroup {
                    conditions: vec![c.clone()],
                },
            ],
        };
        assert_eq!(rule_cost(&body), condition_cost(&c) * 3);
    }
}
