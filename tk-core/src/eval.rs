//! Rule evaluation: DNF short-circuit, sampling gate, diagnostics.

use crate::clock::Clock;
use crate::compiler::CompiledRule;
use crate::condition::evaluate_condition;
use crate::error::{EvalError, RuleLocation};
use crate::identity::RuleId;
use crate::path::FieldPath;
use crate::rng::RandomSource;
use crate::rule::Action;
use serde_json::Value;

/// `matched_condition` as carried on a matched event: `["any", group_index, "all"]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchedCondition {
    pub tag: String,
    pub group_index: usize,
    pub quantifier: String,
}

impl MatchedCondition {
    fn for_group(group_index: usize) -> Self {
        Self {
            tag: "any".to_string(),
            group_index,
            quantifier: "all".to_string(),
        }
    }
}

/// The result of a rule matching a record.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rule_id: RuleId,
    pub matched_condition: MatchedCondition,
    pub matched_field: FieldPath,
    pub matched_value: Value,
    pub action: Action,
}

/// Evaluate a single compiled rule against a record.
///
/// Evaluation is pure over `(record, rule, clock, rng)`: nothing here holds
/// per-record mutable state. `rng` is only consulted when `sample_rate` is
/// strictly between 0.0 and 1.0.
pub fn evaluate_rule(
    rule: &CompiledRule,
    record: &Value,
    rng: &mut dyn RandomSource,
) -> Result<Option<RuleMatch>, EvalError> {
    if !sampling_gate(rule.rule.sample_rate, rng) {
        return Ok(None);
    }

    for (group_index, group) in rule.groups.iter().enumerate() {
        let mut group_matched = true;
        let mut diagnostics = None;

        for (condition_index, condition) in group.conditions.iter().enumerate() {
            let location = RuleLocation::condition(rule.rule.id, group_index, condition_index);
            match evaluate_condition(condition, record, &location)? {
                Some(d) => {
                    if diagnostics.is_none() {
                        diagnostics = Some(d);
                    }
                }
                None => {
                    group_matched = false;
                    break;
                }
            }
        }

        if group_matched {
            let d = diagnostics.expect("a matched non-empty group always sets diagnostics");
            return Ok(Some(RuleMatch {
                rule_id: rule.rule.id,
                matched_condition: MatchedCondition::for_group(group_index),
                matched_field: d.field,
                matched_value: d.value,
                action: rule.rule.action,
            }));
        }
    }

    Ok(None)
}

/// `sample_rate` of 0.0 never admits the record; 1.0 always does; anything
/// in between draws from the injected RNG.
fn sampling_gate(sample_rate: f64, rng: &mut dyn RandomSource) -> bool {
    if sample_rate <= 0.0 {
        return false;
    }
    if sample_rate >= 1.0 {
        return true;
    }
    rng.sample_unit() < sample_rate
}

/// Evaluate every active, in-scope rule in `rules` against `record`,
/// returning one match per rule that fired. Rules are evaluated in the
/// order given; callers typically keep that order stable across a sync
/// snapshot so diagnostics stay reproducible for a given rule cache.
pub fn evaluate_rule_set(
    rules: &[CompiledRule],
    scope_tags: &[String],
    record: &Value,
    clock: &dyn Clock,
    rng: &mut dyn RandomSource,
) -> Result<Vec<RuleMatch>, EvalError> {
    let _ = clock.now();
    let mut matches = Vec::new();
    for rule in rules {
        if !rule.rule.is_active() || !rule.rule.matches_scope(scope_tags) {
            continue;
        }
        if let Some(m) = evaluate_rule(rule, record, rng)? {
            matches.push(m);
        }
    }
    Ok(matches)
}
