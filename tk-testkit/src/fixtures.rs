//! Builders for rules and conditions, to keep test setup declarative
//! instead of hand-assembling nested `Rule`/`Condition` literals.

use std::collections::BTreeSet;
use tk_core::identity::{EntityIdType, RuleId};
use tk_core::path::{FieldPath, Segment};
use tk_core::rule::{
    Action, Comparand, Condition, FieldPolicy, FieldType, Operator, OrGroup, Rule, RuleBody,
    RuleState,
};

/// A single-condition, single-group rule, the common case in unit tests.
pub fn simple_rule(field: &str, op: Operator, field_type: FieldType, value: serde_json::Value) -> Rule {
    rule_with_groups(vec![vec![condition(field, op, field_type, value)]])
}

/// A condition over a dotted field path (`"a.b.c"` → three key segments).
/// Use [`condition_path`] directly for paths containing indices or wildcards.
pub fn condition(
    field: &str,
    op: Operator,
    field_type: FieldType,
    value: serde_json::Value,
) -> Condition {
    condition_path(
        FieldPath::new(field.split('.').map(|s| Segment::Key(s.to_string())).collect()),
        op,
        field_type,
        Some(Comparand::Value(value)),
    )
}

pub fn condition_path(
    field: FieldPath,
    op: Operator,
    field_type: FieldType,
    comparand: Option<Comparand>,
) -> Condition {
    Condition {
        field,
        field_type,
        op,
        comparand,
        on_missing_field: FieldPolicy::Skip,
        on_coercion_fail: FieldPolicy::Skip,
    }
}

/// A rule body built from groups of conditions (DNF: groups are OR'd,
/// conditions within a group are AND'd).
pub fn rule_with_groups(groups: Vec<Vec<Condition>>) -> Rule {
    let now = chrono::Utc::now();
    Rule {
        id: RuleId::now_v7(),
        name: "test-rule".to_string(),
        description: String::new(),
        action: Action::Observe,
        sample_rate: 1.0,
        scope_tags: BTreeSet::new(),
        state: RuleState::Active,
        body: RuleBody {
            groups: groups.into_iter().map(|conditions| OrGroup { conditions }).collect(),
        },
        created_at: now,
        modified_at: now,
        deleted_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_rule_has_one_group_one_condition() {
        let rule = simple_rule("temp", Operator::Gt, FieldType::Numeric, serde_json::json!(100.0));
        assert_eq!(rule.body.groups.len(), 1);
        assert_eq!(rule.body.groups[0].conditions.len(), 1);
    }
}
