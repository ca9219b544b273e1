//! Failure modes governing evaluation when rule sync fails.

use serde_json::Value;
use tk_core::eval::{MatchedCondition, RuleMatch};
use tk_core::identity::RuleId;
use tk_core::path::FieldPath;
use tk_core::rule::Action;

/// How the sensor behaves when it cannot refresh its rule cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Keep evaluating against the last cached rule set; pass through
    /// (no matches) if nothing has ever been cached.
    #[default]
    FailSafe,
    /// Treat every record as a match against every active drop rule.
    /// Intended for security contexts where silent pass-through is worse
    /// than a false positive.
    FailClosed,
    /// Skip evaluation entirely; emit nothing.
    FailOpen,
}

impl FailureMode {
    /// Synthesize matches for a record when sync has failed and this mode
    /// is `FailClosed`. `FailSafe` falls back to the caller's cached rule
    /// set (handled by [`crate::cache::RuleCache`]), and `FailOpen` always
    /// emits nothing, so neither calls this.
    pub fn fail_closed_matches(&self, active_drop_rule_ids: &[RuleId], record: &Value) -> Vec<RuleMatch> {
        if *self != FailureMode::FailClosed {
            return Vec::new();
        }
        active_drop_rule_ids
            .iter()
            .map(|&rule_id| RuleMatch {
                rule_id,
                matched_condition: MatchedCondition {
                    tag: "any".to_string(),
                    group_index: 0,
                    quantifier: "all".to_string(),
                },
                matched_field: FieldPath::new(Vec::new()),
                matched_value: record.clone(),
                action: Action::Drop,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tk_core::identity::EntityIdType;

    #[test]
    fn fail_safe_and_fail_open_synthesize_nothing() {
        let rule_id = RuleId::now_v7();
        let record = serde_json::json!({"a": 1});
        assert!(FailureMode::FailSafe.fail_closed_matches(&[rule_id], &record).is_empty());
        assert!(FailureMode::FailOpen.fail_closed_matches(&[rule_id], &record).is_empty());
    }

    #[test]
    fn fail_closed_synthesizes_one_match_per_active_drop_rule() {
        let rule_ids = [RuleId::now_v7(), RuleId::now_v7()];
        let record = serde_json::json!({"a": 1});
        let matches = FailureMode::FailClosed.fail_closed_matches(&rule_ids, &record);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.action == Action::Drop));
    }
}
