//! Compiles a declarative [`Rule`] into a [`CompiledRule`] predicate tree.
//!
//! Compilation is total: every invalid combination is rejected with a
//! [`CompileError`] naming the offending rule/group/condition location
//! rather than panicking or silently coercing the rule into something else.

use crate::cost::{condition_cost, HARD_BUDGET, SOFT_BUDGET};
use crate::error::{CompileError, CompileWarning, RuleLocation};
use crate::rule::{Comparand, Condition, FieldType, Operator, Rule};
use serde_json::Value;

/// A condition after validation, with its estimated cost attached.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCondition {
    pub source: Condition,
    pub cost: u64,
}

/// A group after validation, with conditions reordered cheapest-first.
///
/// Reordering is stable: conditions of equal cost keep their original
/// relative order, so `matched_field`/`matched_value` diagnostics are
/// reproducible for a given compiler, even though the tie-break order among
/// otherwise-equal-cost conditions is not guaranteed to match other
/// implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGroup {
    pub conditions: Vec<CompiledCondition>,
}

/// The compiled form of a rule: validated, cost-annotated, predicate-ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub rule: Rule,
    pub groups: Vec<CompiledGroup>,
    pub total_cost: u64,
}

/// Compile a single rule. On success, also returns any non-fatal warnings
/// (currently: soft cost-budget overruns).
pub fn compile(rule: &Rule) -> Result<(CompiledRule, Vec<CompileWarning>), CompileError> {
    let mut warnings = Vec::new();

    let name_len = rule.name.chars().count();
    if !(1..=128).contains(&name_len) {
        return Err(CompileError::InvalidName {
            location: RuleLocation::rule(rule.id),
            len: name_len,
        });
    }

    let desc_len = rule.description.chars().count();
    if desc_len > 1024 {
        return Err(CompileError::DescriptionTooLong {
            location: RuleLocation::rule(rule.id),
            len: desc_len,
        });
    }

    if !(0.0..=1.0).contains(&rule.sample_rate) {
        return Err(CompileError::InvalidSampleRate {
            location: RuleLocation::rule(rule.id),
            value: rule.sample_rate,
        });
    }

    if rule.body.groups.is_empty() {
        return Err(CompileError::EmptyRuleBody {
            location: RuleLocation::rule(rule.id),
        });
    }

    let mut groups = Vec::with_capacity(rule.body.groups.len());
    let mut total_cost: u64 = 0;

    for (group_index, group) in rule.body.groups.iter().enumerate() {
        if group.conditions.is_empty() {
            return Err(CompileError::EmptyGroup {
                location: RuleLocation::group(rule.id, group_index),
            });
        }

        let mut compiled_conditions = Vec::with_capacity(group.conditions.len());
        for (condition_index, condition) in group.conditions.iter().enumerate() {
            let location = RuleLocation::condition(rule.id, group_index, condition_index);
            validate_condition(condition, &location)?;
            let cost = condition_cost(condition);
            total_cost += cost;
            compiled_conditions.push(CompiledCondition {
                source: condition.clone(),
                cost,
            });
        }

        // Stable sort: equal-cost conditions keep their declared order.
        compiled_conditions.sort_by_key(|c| c.cost);

        groups.push(CompiledGroup {
            conditions: compiled_conditions,
        });
    }

    if total_cost > HARD_BUDGET {
        return Err(CompileError::CostBudgetExceeded {
            location: RuleLocation::rule(rule.id),
            cost: total_cost,
            budget: HARD_BUDGET,
        });
    }
    if total_cost > SOFT_BUDGET {
        warnings.push(CompileWarning {
            location: RuleLocation::rule(rule.id),
            message: format!(
                "estimated cost {total_cost} exceeds the soft budget of {SOFT_BUDGET}"
            ),
        });
    }

    Ok((
        CompiledRule {
            rule: rule.clone(),
            groups,
            total_cost,
        },
        warnings,
    ))
}

fn validate_condition(condition: &Condition, location: &RuleLocation) -> Result<(), CompileError> {
    if condition.field.is_empty() {
        return Err(CompileError::EmptyFieldPath {
            location: location.clone(),
        });
    }

    let wildcards = condition.field.wildcard_count();
    if wildcards > 2 {
        return Err(CompileError::TooManyWildcards {
            location: location.clone(),
            count: wildcards,
        });
    }

    if !condition.op.compatible_with(condition.field_type) {
        return Err(CompileError::IncompatibleOperator {
            location: location.clone(),
            op: condition.op,
            field_type: condition.field_type,
        });
    }

    if condition.op.requires_comparand() {
        match &condition.comparand {
            None => {
                return Err(CompileError::MissingComparand {
                    location: location.clone(),
                })
            }
            Some(Comparand::FieldRef(field_ref)) => {
                if field_ref.has_wildcard() {
                    return Err(CompileError::WildcardInFieldRef {
                        location: location.clone(),
                    });
                }
            }
            Some(Comparand::Values(values)) => {
                if condition.op != Operator::In {
                    return Err(CompileError::InRequiresValues {
                        location: location.clone(),
                        other: "values",
                    });
                }
                validate_values(values, location)?;
            }
            Some(Comparand::Value(_)) => {
                if condition.op == Operator::In {
                    return Err(CompileError::InRequiresValues {
                        location: location.clone(),
                        other: "value",
                    });
                }
            }
        }
    }

    Ok(())
}

fn validate_values(values: &[Value], location: &RuleLocation) -> Result<(), CompileError> {
    if values.len() > 64 {
        return Err(CompileError::TooManyValues {
            location: location.clone(),
            count: values.len(),
        });
    }
    if let Some(first) = values.first() {
        let discriminant = std::mem::discriminant(first);
        if values.iter().any(|v| std::mem::discriminant(v) != discriminant) {
            return Err(CompileError::HeterogeneousValues {
                location: location.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{FieldPath, Segment};
    use crate::rule::{FieldPolicy, OrGroup, RuleBody};
    use serde_json::json;

    fn base_rule(body: RuleBody) -> Rule {
        let mut rule = tk_testkit::fixtures::rule_with_groups(vec![]);
        rule.body = body;
        rule
    }

    fn simple_condition() -> Condition {
        tk_testkit::fixtures::condition("temperature", Operator::Gt, FieldType::Numeric, json!(100))
    }

    #[test]
    fn compiles_a_simple_rule() {
        let rule = base_rule(RuleBody {
            groups: vec![OrGroup {
                conditions: vec![simple_condition()],
            }],
        });
        let (compiled, warnings) = compile(&rule).expect("should compile");
        assert!(warnings.is_empty());
        assert_eq!(compiled.groups.len(), 1);
    }

    #[test]
    fn rejects_empty_body() {
        let rule = base_rule(RuleBody { groups: vec![] });
        assert!(matches!(
            compile(&rule),
            Err(CompileError::EmptyRuleBody { .. })
        ));
    }

    #[test]
    fn rejects_empty_group() {
        let rule = base_rule(RuleBody {
            groups: vec![OrGroup { conditions: vec![] }],
        });
        assert!(matches!(compile(&rule), Err(CompileError::EmptyGroup { .. })));
    }

    #[test]
    fn rejects_incompatible_operator() {
        let mut c = simple_condition();
        c.field_type = FieldType::Text;
        let rule = base_rule(RuleBody {
            groups: vec![OrGroup { conditions: vec![c] }],
        });
        assert!(matches!(
            compile(&rule),
            Err(CompileError::IncompatibleOperator { .. })
        ));
    }

    #[test]
    fn rejects_wildcard_in_field_ref() {
        let mut c = simple_condition();
        c.comparand = Some(Comparand::FieldRef(FieldPath::new(vec![Segment::Wildcard])));
        let rule = base_rule(RuleBody {
            groups: vec![OrGroup { conditions: vec![c] }],
        });
        assert!(matches!(
            compile(&rule),
            Err(CompileError::WildcardInFieldRef { .. })
        ));
    }

    #[test]
    fn rejects_more_than_two_wildcards() {
        let mut c = simple_condition();
        c.field = FieldPath::new(vec![Segment::Wildcard, Segment::Wildcard, Segment::Wildcard]);
        let rule = base_rule(RuleBody {
            groups: vec![OrGroup { conditions: vec![c] }],
        });
        assert!(matches!(
            compile(&rule),
            Err(CompileError::TooManyWildcards { .. })
        ));
    }

    #[test]
    fn rejects_more_than_64_in_values() {
        let mut c = simple_condition();
        c.op = Operator::In;
        c.field_type = FieldType::Numeric;
        c.comparand = Some(Comparand::Values((0..65).map(|i| json!(i)).collect()));
        let rule = base_rule(RuleBody {
            groups: vec![OrGroup { conditions: vec![c] }],
        });
        assert!(matches!(
            compile(&rule),
            Err(CompileError::TooManyValues { .. })
        ));
    }

    #[test]
    fn rejects_heterogeneous_in_values() {
        let mut c = simple_condition();
        c.op = Operator::In;
        c.field_type = FieldType::Any;
        c.comparand = Some(Comparand::Values(vec![json!(1), json!("a")]));
        let rule = base_rule(RuleBody {
            groups: vec![OrGroup { conditions: vec![c] }],
        });
        assert!(matches!(
            compile(&rule),
            Err(CompileError::HeterogeneousValues { .. })
        ));
    }

    #[test]
    fn orders_conditions_cheapest_first_and_is_stable() {
        let cheap = simple_condition();
        let mut expensive = simple_condition();
        expensive.field = FieldPath::new(vec![
            Segment::Wildcard,
            Segment::Key("temp".into()),
        ]);
        expensive.field_type = FieldType::Text;
        expensive.op = Operator::Prefix;
        expensive.comparand = Some(Comparand::Value(json!("x")));

        let rule = base_rule(RuleBody {
            groups: vec![OrGroup {
                conditions: vec![expensive.clone(), cheap.clone()],
            }],
        });
        let (compiled, _) = compile(&rule).unwrap();
        assert_eq!(compiled.groups[0].conditions[0].source, cheap);
        assert_eq!(compiled.groups[0].conditions[1].source, expensive);
    }
}
