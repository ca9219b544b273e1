//! Declarative rule model: the shape an operator authors and the compiler consumes.

use crate::identity::{RuleId, Timestamp};
use crate::path::FieldPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What happens when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Report the match; take no other action on the host pipeline.
    Observe,
    /// Report the match and signal "drop" to the host.
    Drop,
    /// Raise rather than report; used for rules whose conditions request it.
    Error,
}

/// A rule's place in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleState {
    Draft,
    Active,
    Disabled,
}

/// The operator table, closed by design: new operators require a schema
/// migration, not a runtime extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Prefix,
    Suffix,
    In,
    IsNull,
    Exists,
}

impl Operator {
    /// Whether this operator is compatible with the given field type, per
    /// the operator/field_type table.
    pub fn compatible_with(self, field_type: FieldType) -> bool {
        use FieldType::*;
        use Operator::*;
        match self {
            Eq | Neq => matches!(field_type, Any | Numeric | Text | Boolean),
            Lt | Lte | Gt | Gte => matches!(field_type, Numeric),
            Prefix | Suffix => matches!(field_type, Any | Text),
            In => matches!(field_type, Any | Numeric | Text | Boolean),
            IsNull | Exists => true,
        }
    }

    /// Whether this operator requires a comparand (`value`, `values`, or
    /// `field_ref`). `is_null`/`exists` are unary.
    pub fn requires_comparand(self) -> bool {
        !matches!(self, Operator::IsNull | Operator::Exists)
    }
}

/// The declared type a condition's field is interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Any,
    Numeric,
    Text,
    Boolean,
}

/// What to do when a condition's field cannot be resolved, or resolves to a
/// null-like value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    #[default]
    Skip,
    Match,
    Error,
}

/// A scalar or list literal a condition compares against, or a reference to
/// another field in the same record. Exactly one of these — or none, for
/// the unary operators — is set on a declared condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparand {
    Value(serde_json::Value),
    Values(Vec<serde_json::Value>),
    FieldRef(FieldPath),
}

/// A single predicate within a group, in its declarative (uncompiled) form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: FieldPath,
    pub field_type: FieldType,
    pub op: Operator,
    pub comparand: Option<Comparand>,
    #[serde(default)]
    pub on_missing_field: FieldPolicy,
    #[serde(default)]
    pub on_coercion_fail: FieldPolicy,
}

/// An AND-list of conditions; a rule's body is an OR-list of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrGroup {
    pub conditions: Vec<Condition>,
}

/// The disjunctive-normal-form body of a rule: a non-empty ordered list of
/// groups, each a non-empty ordered list of conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuleBody {
    pub groups: Vec<OrGroup>,
}

/// A declarative rule as authored by an operator, before compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub description: String,
    pub action: Action,
    pub sample_rate: f64,
    pub scope_tags: BTreeSet<String>,
    pub state: RuleState,
    pub body: RuleBody,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Rule {
    pub fn is_active(&self) -> bool {
        self.state == RuleState::Active && self.deleted_at.is_none()
    }

    pub fn matches_scope(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.scope_tags.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_compatibility_matches_the_table() {
        assert!(Operator::Gt.compatible_with(FieldType::Numeric));
        assert!(!Operator::Gt.compatible_with(FieldType::Text));
        assert!(Operator::Prefix.compatible_with(FieldType::Text));
        assert!(!Operator::Prefix.compatible_with(FieldType::Numeric));
        assert!(Operator::IsNull.compatible_with(FieldType::Numeric));
    }

    #[test]
    fn unary_operators_do_not_require_a_comparand() {
        assert!(!Operator::IsNull.requires_comparand());
        assert!(!Operator::Exists.requires_comparand());
        assert!(Operator::Eq.requires_comparand());
    }

    #[test]
    fn field_policy_defaults_to_skip() {
        assert_eq!(FieldPolicy::default(), FieldPolicy::Skip);
    }
}
